//! Project configuration, toolchain version, environment check and install

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use serde::Serialize;

use super::validate_target;
use crate::error::{Result, ToolError};
use crate::parsers::sdkconfig;
use crate::paths::{self, HostShell};
use crate::toolchain::{RootSource, Toolchain, ENTRY_POINT, EXPORT_SCRIPT, INSTALL_SCRIPT};

/// Entries returned by `get_project_config` when no cap is given
pub const DEFAULT_CONFIG_ENTRIES: usize = 100;

pub fn menuconfig() -> Vec<String> {
    vec!["menuconfig".to_string()]
}

pub fn reconfigure() -> Vec<String> {
    vec!["reconfigure".to_string()]
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub sdkconfig_path: PathBuf,
    pub total_entries: usize,
    pub entries: BTreeMap<String, String>,
    pub truncated: bool,
}

fn read_sdkconfig(project: &Path) -> Result<(PathBuf, BTreeMap<String, String>)> {
    let path = project.join("sdkconfig");
    if !path.is_file() {
        return Err(ToolError::validation(
            "project_path",
            format!("{} not found; run set-target or build first", path.display()),
        ));
    }
    let text = fs::read_to_string(&path)?;
    Ok((path, sdkconfig::parse(&text)))
}

/// One key (with or without the `CONFIG_` prefix) or the first `max_entries` keys
pub fn project_config(project: &Path, key: Option<&str>, max_entries: Option<usize>) -> Result<ConfigView> {
    let (sdkconfig_path, all) = read_sdkconfig(project)?;
    let total_entries = all.len();

    if let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) {
        let full = if key.starts_with("CONFIG_") {
            key.to_string()
        } else {
            format!("CONFIG_{}", key)
        };
        let value = all.get(&full).ok_or_else(|| {
            ToolError::validation("config_key", format!("{} is not set in sdkconfig", full))
        })?;
        return Ok(ConfigView {
            sdkconfig_path,
            total_entries,
            entries: BTreeMap::from([(full, value.clone())]),
            truncated: false,
        });
    }

    let cap = max_entries.unwrap_or(DEFAULT_CONFIG_ENTRIES);
    Ok(ConfigView {
        sdkconfig_path,
        total_entries,
        truncated: total_entries > cap,
        entries: all.into_iter().take(cap).collect(),
    })
}

/// Point the project's sdkconfig at a custom partition CSV inside the project.
/// Returns the CSV name as written into sdkconfig.
pub fn apply_partition_table(project: &Path, csv: &str) -> Result<String> {
    let csv_path = paths::scoped_path(project, csv)?;
    if !csv_path.is_file() {
        return Err(ToolError::validation(
            "partition_csv",
            format!("{} does not exist", csv_path.display()),
        ));
    }

    let root = project.canonicalize()?;
    let relative = csv_path
        .strip_prefix(&root)
        .map_err(|_| ToolError::validation("partition_csv", "partition table must be inside the project"))?;
    let csv_name = relative.to_string_lossy().replace('\\', "/");

    let sdkconfig_path = project.join("sdkconfig");
    let current = match fs::read_to_string(&sdkconfig_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    fs::write(&sdkconfig_path, sdkconfig::with_custom_partition_table(&current, &csv_name))?;
    Ok(csv_name)
}

/// Version from `version.txt`, when the installation ships one
pub fn version_file(root: &Path) -> Option<String> {
    fs::read_to_string(root.join("version.txt"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn git_describe() -> Vec<String> {
    ["git", "describe", "--tags", "--always"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Targets for install.sh: a comma-separated list of chips, or `all`
pub fn install_targets(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };
    if raw.eq_ignore_ascii_case("all") {
        return Ok(vec!["all".to_string()]);
    }
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| validate_target("targets", t).map(str::to_string))
        .collect()
}

/// `bash install.sh [chip,chip]`
pub fn install(toolchain: &Toolchain, targets: &[String], shell: HostShell) -> Result<Vec<String>> {
    let script = toolchain.install_script();
    if !script.is_file() {
        return Err(ToolError::InvalidToolchain(format!(
            "{} not found in {}",
            INSTALL_SCRIPT,
            toolchain.root.display()
        )));
    }
    let mut argv = vec!["bash".to_string(), paths::normalize_path(&script, shell)];
    if !targets.is_empty() {
        argv.push(targets.join(","));
    }
    Ok(argv)
}

#[derive(Debug, Serialize)]
pub struct EnvironmentReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idf_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RootSource>,
    pub has_entry_point: bool,
    pub has_export_script: bool,
    pub has_install_script: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

/// Resolution report; resolver failures are reported, not raised
pub fn check_environment(explicit: Option<&str>, default: Option<&Path>) -> EnvironmentReport {
    match Toolchain::resolve(explicit, default) {
        Ok(tc) => {
            let has_export_script = tc.root.join(EXPORT_SCRIPT).is_file();
            let has_install_script = tc.root.join(INSTALL_SCRIPT).is_file();
            EnvironmentReport {
                ok: has_export_script,
                version: version_file(&tc.root),
                has_entry_point: true,
                has_export_script,
                has_install_script,
                error: (!has_export_script).then(|| format!("{} not found", EXPORT_SCRIPT)),
                error_kind: None,
                source: Some(tc.source),
                idf_path: Some(tc.root),
            }
        }
        Err(e) => {
            let candidate = explicit
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .or_else(|| default.map(Path::to_path_buf));
            let present = |name: &str| candidate.as_ref().is_some_and(|r| r.join(name).is_file());
            EnvironmentReport {
                ok: false,
                has_entry_point: present(ENTRY_POINT),
                has_export_script: present(EXPORT_SCRIPT),
                has_install_script: present(INSTALL_SCRIPT),
                idf_path: candidate,
                source: None,
                version: None,
                error_kind: Some(e.kind()),
                error: Some(e.to_string()),
            }
        }
    }
}
