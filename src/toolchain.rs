//! ESP-IDF installation discovery and per-call execution context

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::paths::{self, HostShell};
use crate::runner::{self, CommandResult};

/// File every valid installation must contain
pub const ENTRY_POINT: &str = "tools/idf.py";
pub const EXPORT_SCRIPT: &str = "export.sh";
pub const INSTALL_SCRIPT: &str = "install.sh";

/// Sources `export.sh` (passed as `$1`) and execs the remaining arguments
const SOURCED_EXEC: &str = ". \"$1\" >/dev/null || exit $?; shift; exec \"$@\"";

/// Where a resolved toolchain root came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootSource {
    Argument,
    Default,
}

/// A validated ESP-IDF installation
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub root: PathBuf,
    pub source: RootSource,
}

impl Toolchain {
    /// Resolve the toolchain root: explicit argument first, then the
    /// process-wide default. Blank explicit values count as absent.
    pub fn resolve(explicit: Option<&str>, default: Option<&Path>) -> Result<Self> {
        let (root, source) = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(path) => (PathBuf::from(path), RootSource::Argument),
            None => match default {
                Some(path) => (path.to_path_buf(), RootSource::Default),
                None => {
                    return Err(ToolError::Configuration(
                        "no idf_path argument and no default (set --idf-path or IDF_PATH)".to_string(),
                    ))
                }
            },
        };

        if !root.is_dir() {
            return Err(ToolError::InvalidToolchain(format!(
                "{} does not exist or is not a directory",
                root.display()
            )));
        }
        if !root.join(ENTRY_POINT).is_file() {
            return Err(ToolError::InvalidToolchain(format!(
                "{} not found in {}",
                ENTRY_POINT,
                root.display()
            )));
        }

        debug!("Resolved ESP-IDF root {} ({:?})", root.display(), source);
        Ok(Self { root, source })
    }

    pub fn export_script(&self) -> PathBuf {
        self.root.join(EXPORT_SCRIPT)
    }

    pub fn install_script(&self) -> PathBuf {
        self.root.join(INSTALL_SCRIPT)
    }

    /// Build the execution context for a command run from `working_dir`
    pub fn context(&self, working_dir: &Path, timeout: Option<Duration>) -> ExecutionContext {
        let mut env_overlay = BTreeMap::new();
        env_overlay.insert("IDF_PATH".to_string(), self.root.to_string_lossy().to_string());

        ExecutionContext {
            toolchain_root: self.root.clone(),
            working_directory: working_dir.to_path_buf(),
            env_overlay,
            timeout,
        }
    }
}

/// Everything needed to run one command. Built per call, never shared.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub toolchain_root: PathBuf,
    pub working_directory: PathBuf,
    pub env_overlay: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl ExecutionContext {
    /// Wrap `program args…` so it runs inside the sourced ESP-IDF environment
    pub fn sourced_argv(&self, shell: HostShell, program: &str, args: &[String]) -> Result<Vec<String>> {
        let export = self.toolchain_root.join(EXPORT_SCRIPT);
        if !export.is_file() {
            return Err(ToolError::InvalidToolchain(format!(
                "{} not found in {}",
                EXPORT_SCRIPT,
                self.toolchain_root.display()
            )));
        }

        let mut argv = vec![
            "bash".to_string(),
            "-c".to_string(),
            SOURCED_EXEC.to_string(),
            "esp-idf-mcp".to_string(),
            paths::normalize_path(&export, shell),
            program.to_string(),
        ];
        argv.extend(args.iter().cloned());
        Ok(argv)
    }

    /// Run `idf.py args…` in the sourced environment
    pub async fn run_idf(&self, shell: HostShell, args: &[String]) -> Result<CommandResult> {
        let argv = self.sourced_argv(shell, "idf.py", args)?;
        self.run(&argv).await
    }

    /// Run an argument vector as-is within this context
    pub async fn run(&self, argv: &[String]) -> Result<CommandResult> {
        runner::run(argv, &self.working_directory, &self.env_overlay, self.timeout).await
    }

    /// Command line a user can paste into an interactive terminal
    pub fn interactive_command(&self, shell: HostShell, idf_args: &[String]) -> String {
        let export = paths::normalize_path(&self.toolchain_root.join(EXPORT_SCRIPT), shell);
        format!(
            "cd {} && . {} && idf.py {}",
            shell_quote(&paths::normalize_path(&self.working_directory, shell)),
            shell_quote(&export),
            idf_args.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
        )
    }
}

/// Single-quote a word for display in a POSIX shell command line
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_idf() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("tools")).unwrap();
        fs::write(tmp.path().join(ENTRY_POINT), "#!/usr/bin/env python3\n").unwrap();
        fs::write(tmp.path().join(EXPORT_SCRIPT), "# export\n").unwrap();
        tmp
    }

    #[test]
    fn test_explicit_path_wins_over_default() {
        let explicit = fake_idf();
        let default = fake_idf();
        let tc = Toolchain::resolve(explicit.path().to_str(), Some(default.path())).unwrap();
        assert_eq!(tc.root, explicit.path());
        assert_eq!(tc.source, RootSource::Argument);
    }

    #[test]
    fn test_default_used_when_no_explicit() {
        let default = fake_idf();
        let tc = Toolchain::resolve(None, Some(default.path())).unwrap();
        assert_eq!(tc.root, default.path());
        assert_eq!(tc.source, RootSource::Default);

        let tc = Toolchain::resolve(Some("   "), Some(default.path())).unwrap();
        assert_eq!(tc.source, RootSource::Default);
    }

    #[test]
    fn test_no_source_is_configuration_error() {
        let err = Toolchain::resolve(None, None).unwrap_err();
        assert!(matches!(err, ToolError::Configuration(_)));
    }

    #[test]
    fn test_missing_entry_point_is_invalid_toolchain() {
        let tmp = TempDir::new().unwrap();
        let err = Toolchain::resolve(tmp.path().to_str(), None).unwrap_err();
        assert!(matches!(err, ToolError::InvalidToolchain(_)));

        let err = Toolchain::resolve(Some("/nonexistent/esp-idf-xyz"), None).unwrap_err();
        assert!(matches!(err, ToolError::InvalidToolchain(_)));
    }

    #[test]
    fn test_context_sets_idf_path() {
        let idf = fake_idf();
        let tc = Toolchain::resolve(idf.path().to_str(), None).unwrap();
        let ctx = tc.context(Path::new("/tmp"), None);
        assert_eq!(
            ctx.env_overlay.get("IDF_PATH").map(String::as_str),
            idf.path().to_str()
        );
    }

    #[test]
    fn test_sourced_argv_keeps_arguments_separate() {
        let idf = fake_idf();
        let tc = Toolchain::resolve(idf.path().to_str(), None).unwrap();
        let ctx = tc.context(Path::new("/tmp"), None);
        let argv = ctx
            .sourced_argv(HostShell::Native, "idf.py", &["set-target".to_string(), "esp32 s3".to_string()])
            .unwrap();
        assert_eq!(argv[0], "bash");
        assert_eq!(argv[5], "idf.py");
        assert_eq!(&argv[6..], &["set-target".to_string(), "esp32 s3".to_string()]);
    }

    #[test]
    fn test_missing_export_script_is_invalid_toolchain() {
        let idf = fake_idf();
        fs::remove_file(idf.path().join(EXPORT_SCRIPT)).unwrap();
        let tc = Toolchain::resolve(idf.path().to_str(), None).unwrap();
        let ctx = tc.context(Path::new("/tmp"), None);
        assert!(matches!(
            ctx.sourced_argv(HostShell::Native, "idf.py", &[]),
            Err(ToolError::InvalidToolchain(_))
        ));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("build"), "build");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
