//! Project scaffolding and inspection

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use serde::Serialize;

use super::{configured_target, validate_target};
use crate::error::{Result, ToolError};
use crate::parsers::dependencies::{self, ComponentDeps};
use crate::paths::{self, HostShell};

const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "h", "hpp", "S"];

/// Directories never descended into when scanning a project
const SKIP_DIRS: &[&str] = &["build", "node_modules", "__pycache__"];

pub fn validate_project_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(ToolError::validation(
            "project_name",
            format!("'{}' must contain only letters, digits, '_' and '-'", name),
        ))
    }
}

/// `idf.py create-project --path <dir> <name>`
pub fn create(project_dir: &Path, name: &str, shell: HostShell) -> Result<Vec<String>> {
    let name = validate_project_name(name)?;
    Ok(vec![
        "create-project".to_string(),
        "--path".to_string(),
        paths::normalize_path(project_dir, shell),
        name.to_string(),
    ])
}

/// `idf.py set-target <chip>`
pub fn set_target(target: &str) -> Result<Vec<String>> {
    let chip = validate_target("target", target)?;
    Ok(vec!["set-target".to_string(), chip.to_string()])
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ComponentSummary {
    pub name: String,
    /// "main", "local" or "managed"
    pub kind: &'static str,
    pub path: PathBuf,
    pub source_files: usize,
    pub has_cmakelists: bool,
}

#[derive(Debug, Serialize)]
pub struct ProjectInfo {
    pub project_path: PathBuf,
    pub has_cmakelists: bool,
    pub has_sdkconfig: bool,
    pub has_main: bool,
    pub has_components: bool,
    pub has_build_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub source_files: usize,
    pub components: Vec<ComponentSummary>,
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

fn skipped(name: &str) -> bool {
    name.starts_with('.') || SKIP_DIRS.contains(&name)
}

fn count_sources(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                if skipped(&name) {
                    0
                } else {
                    count_sources(&path)
                }
            } else if is_source(&path) {
                1
            } else {
                0
            }
        })
        .sum()
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .filter(|p| {
                    p.file_name()
                        .is_some_and(|n| !n.to_string_lossy().starts_with('.'))
                })
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}

fn summarize(path: PathBuf, kind: &'static str) -> ComponentSummary {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    ComponentSummary {
        source_files: count_sources(&path),
        has_cmakelists: path.join("CMakeLists.txt").is_file(),
        name,
        kind,
        path,
    }
}

/// `main`, `components/*` and `managed_components/*`
pub fn list_components(project: &Path) -> Vec<ComponentSummary> {
    let mut components = Vec::new();
    let main = project.join("main");
    if main.is_dir() {
        components.push(summarize(main, "main"));
    }
    for dir in subdirs(&project.join("components")) {
        components.push(summarize(dir, "local"));
    }
    for dir in subdirs(&project.join("managed_components")) {
        components.push(summarize(dir, "managed"));
    }
    components
}

pub fn project_info(project: &Path) -> ProjectInfo {
    let components = list_components(project);
    ProjectInfo {
        project_path: project.to_path_buf(),
        has_cmakelists: project.join("CMakeLists.txt").is_file(),
        has_sdkconfig: project.join("sdkconfig").is_file(),
        has_main: project.join("main").is_dir(),
        has_components: project.join("components").is_dir(),
        has_build_dir: project.join("build").is_dir(),
        target: configured_target(project),
        source_files: components.iter().map(|c| c.source_files).sum(),
        components,
    }
}

/// Every `CMakeLists.txt` under the project that registers a component,
/// keyed by its directory name. The project-level file is skipped.
pub fn scan_component_dependencies(project: &Path) -> BTreeMap<String, ComponentDeps> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<String, ComponentDeps>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.flatten().collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                if !skipped(&name) {
                    walk(&path, root, out);
                }
            } else if name == "CMakeLists.txt" && dir != root {
                let Ok(text) = fs::read_to_string(&path) else {
                    continue;
                };
                if let (Some(deps), Some(component)) = (dependencies::parse_cmake(&text), dir.file_name()) {
                    out.insert(component.to_string_lossy().to_string(), deps);
                }
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(project, project, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("CMakeLists.txt"), "cmake_minimum_required(VERSION 3.16)\nproject(blink)\n").unwrap();
        fs::write(root.join("sdkconfig"), "CONFIG_IDF_TARGET=\"esp32c3\"\n").unwrap();
        fs::create_dir_all(root.join("main")).unwrap();
        fs::write(root.join("main/main.c"), "void app_main(void) {}\n").unwrap();
        fs::write(
            root.join("main/CMakeLists.txt"),
            "idf_component_register(SRCS \"main.c\" REQUIRES sensor)\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("components/sensor/include")).unwrap();
        fs::write(root.join("components/sensor/sensor.c"), "").unwrap();
        fs::write(root.join("components/sensor/include/sensor.h"), "").unwrap();
        fs::write(
            root.join("components/sensor/CMakeLists.txt"),
            "idf_component_register(SRCS \"sensor.c\" INCLUDE_DIRS include PRIV_REQUIRES driver)\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("build/esp-idf/main")).unwrap();
        fs::write(root.join("build/esp-idf/main/CMakeLists.txt"), "idf_component_register(REQUIRES junk)\n").unwrap();
        tmp
    }

    #[test]
    fn test_project_name_validation() {
        assert!(validate_project_name("blink_led-2").is_ok());
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name("../evil").is_err());
        assert!(validate_project_name("has space").is_err());
    }

    #[test]
    fn test_create_args() {
        let argv = create(Path::new("/work/blink"), "blink", HostShell::Native).unwrap();
        assert_eq!(argv, vec!["create-project", "--path", "/work/blink", "blink"]);
    }

    #[test]
    fn test_set_target_validates() {
        assert_eq!(set_target("esp32s3").unwrap(), vec!["set-target", "esp32s3"]);
        assert!(set_target("esp8266").is_err());
    }

    #[test]
    fn test_project_info() {
        let tmp = sample_project();
        let info = project_info(tmp.path());
        assert!(info.has_cmakelists);
        assert!(info.has_sdkconfig);
        assert!(info.has_main);
        assert_eq!(info.target.as_deref(), Some("esp32c3"));
        assert_eq!(info.source_files, 3);
        assert_eq!(info.components.len(), 2);
    }

    #[test]
    fn test_list_components_kinds() {
        let tmp = sample_project();
        fs::create_dir_all(tmp.path().join("managed_components/espressif__led_strip")).unwrap();
        let components = list_components(tmp.path());
        let kinds: Vec<&str> = components.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec!["main", "local", "managed"]);
        assert_eq!(components[1].name, "sensor");
        assert_eq!(components[1].source_files, 2);
    }

    #[test]
    fn test_scan_skips_build_and_root() {
        let tmp = sample_project();
        let deps = scan_component_dependencies(tmp.path());
        let names: Vec<&String> = deps.keys().collect();
        assert_eq!(names, vec!["main", "sensor"]);
        assert!(deps["main"].requires.contains("sensor"));
        assert!(deps["sensor"].priv_requires.contains("driver"));
    }
}
