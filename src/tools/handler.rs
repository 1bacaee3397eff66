//! RMCP 0.3.2 implementation of the ESP-IDF MCP tools
//!
//! Each tool validates its arguments through a command builder, runs the
//! resulting `idf.py` invocation inside the sourced ESP-IDF environment and
//! returns the output together with a parsed summary where one applies.

use rmcp::{
    tool, tool_router, tool_handler, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    ErrorData as McpError,
    service::RequestContext,
    RoleServer,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use std::future::Future;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::*;
use crate::commands::{self, build, configure, debug as debugging, device, project, testing};
use crate::config::Config;
use crate::error::{self, ToolError};
use crate::parsers::{build_log, dependencies, device_log, memory_map, sdkconfig, task_stats};
use crate::parsers::device_log::Level;
use crate::paths;
use crate::toolchain::Toolchain;

/// Entries returned by `list_files` before the listing is cut short
const MAX_LIST_ENTRIES: usize = 1000;

/// ESP-IDF tool handler
#[derive(Clone)]
pub struct EspIdfToolHandler {
    tool_router: ToolRouter<EspIdfToolHandler>,
    config: Config,
}

impl EspIdfToolHandler {
    pub fn new(config: Config) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn toolchain(&self, idf_path: Option<&str>) -> error::Result<Toolchain> {
        Toolchain::resolve(idf_path, self.config.idf_path.as_deref())
    }

    /// The call's port, else the configured default port
    fn port(&self, port: Option<&str>) -> Option<String> {
        port.map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_port.clone())
    }

    /// Run `idf.py args…` to completion; a non-zero exit is returned, not raised
    async fn run_idf(
        &self,
        toolchain: &Toolchain,
        project_dir: &Path,
        idf_args: &[String],
        timeout: Duration,
    ) -> error::Result<CommandOutput> {
        let ctx = toolchain.context(project_dir, Some(timeout));
        let result = ctx.run_idf(self.config.host_shell, idf_args).await?;
        let output = CommandOutput::new(format!("idf.py {}", idf_args.join(" ")), result);

        if output.success {
            info!("{} completed in {:.1}s", output.command, output.duration_seconds);
        } else {
            error!("{} failed with exit code {}", output.command, output.exit_code);
        }
        Ok(output)
    }

    /// Run `idf.py args…` for at most `window`; hitting the window is a
    /// normal end of capture
    async fn capture_idf(
        &self,
        toolchain: &Toolchain,
        project_dir: &Path,
        idf_args: &[String],
        window: Duration,
    ) -> error::Result<Capture> {
        let ctx = toolchain.context(project_dir, Some(window));
        match ctx.run_idf(self.config.host_shell, idf_args).await {
            Ok(result) => Ok(Capture {
                timed_out: false,
                exit_code: Some(result.exit_code),
                stdout: result.stdout,
                stderr: result.stderr,
            }),
            Err(ToolError::Timeout { stdout, stderr, .. }) => {
                debug!("Capture window of {}s closed", window.as_secs());
                Ok(Capture {
                    timed_out: true,
                    exit_code: None,
                    stdout,
                    stderr,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn capture_window(&self, seconds: Option<u64>) -> error::Result<Duration> {
        match seconds {
            Some(0) => Err(ToolError::validation("duration_seconds", "must be at least 1 second")),
            Some(s) => Ok(Duration::from_secs(s)),
            None => Ok(self.config.serial_timeout),
        }
    }

    /// Monitor capture shared by the runtime-analysis tools
    async fn device_capture(&self, args: &DeviceCaptureArgs) -> error::Result<(Option<String>, Duration, Capture)> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let idf_args = device::monitor(port.as_deref(), args.baud)?;
        let window = self.capture_window(args.duration_seconds)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let capture = self.capture_idf(&toolchain, &project_dir, &idf_args, window).await?;
        Ok((port, window, capture))
    }
}

impl Default for EspIdfToolHandler {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Inline text wins over a file path
fn text_or_file(text: Option<String>, path: Option<&str>, field: &str) -> error::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    match path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => {
            let bytes = fs::read(p)
                .map_err(|e| ToolError::validation(field, format!("cannot read {}: {}", p, e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        None => Err(ToolError::validation(field, "provide the text or a file path")),
    }
}

fn level_filter(raw: Option<&str>) -> error::Result<Option<Level>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Level::parse(s).map(Some).ok_or_else(|| {
            ToolError::validation("filter_level", format!("unknown level '{}'; use E, W, I, D or V", s))
        }),
    }
}

// ============================================================================
// file operations
// ============================================================================

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn read_scoped(root: &Path, relative: &str, max_lines: usize) -> error::Result<ReadFileResult> {
    let path = paths::scoped_path(root, relative)?;
    if !path.is_file() {
        return Err(ToolError::validation("path", format!("{} is not a file", relative)));
    }
    let bytes = fs::read(&path)?;
    let text = String::from_utf8_lossy(&bytes);
    let total_lines = text.lines().count();
    let content: Vec<&str> = text.lines().take(max_lines).collect();

    Ok(ReadFileResult {
        path: relative.to_string(),
        total_lines,
        lines_returned: content.len(),
        truncated: total_lines > max_lines,
        content: content.join("\n"),
    })
}

fn write_scoped(root: &Path, relative: &str, content: &str, create_dirs: bool) -> error::Result<WriteFileResult> {
    let path = paths::scoped_path(root, relative)?;
    if path.is_dir() {
        return Err(ToolError::validation("path", format!("{} is a directory", relative)));
    }
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if !create_dirs {
                return Err(ToolError::validation(
                    "path",
                    format!("parent directory of {} does not exist", relative),
                ));
            }
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&path, content)?;
    Ok(WriteFileResult {
        path: relative.to_string(),
        bytes_written: content.len(),
    })
}

fn list_scoped(root: &Path, relative: Option<&str>, recursive: bool, pattern: Option<&str>) -> error::Result<ListFilesResult> {
    fn walk(
        dir: &Path,
        root: &Path,
        recursive: bool,
        pattern: Option<&str>,
        out: &mut Vec<FileEntry>,
    ) -> error::Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.flatten().collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if out.len() > MAX_LIST_ENTRIES {
                return Ok(());
            }
            // symlinks are listed but never followed
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let matches = pattern.is_none_or(|suffix| name.ends_with(suffix));

            if file_type.is_dir() {
                if pattern.is_none() {
                    out.push(FileEntry {
                        path: relative_display(root, &path),
                        is_dir: true,
                        size_bytes: 0,
                    });
                }
                if recursive {
                    walk(&path, root, recursive, pattern, out)?;
                }
            } else if matches {
                out.push(FileEntry {
                    path: relative_display(root, &path),
                    is_dir: false,
                    size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
                });
            }
        }
        Ok(())
    }

    let canonical_root = root.canonicalize()?;
    let relative = relative.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(".");
    let dir = paths::scoped_path(root, relative)?;
    if !dir.is_dir() {
        return Err(ToolError::validation("path", format!("{} is not a directory", relative)));
    }

    let pattern = pattern.map(str::trim).filter(|p| !p.is_empty());
    let mut entries = Vec::new();
    walk(&dir, &canonical_root, recursive, pattern, &mut entries)?;
    let truncated = entries.len() > MAX_LIST_ENTRIES;
    entries.truncate(MAX_LIST_ENTRIES);

    Ok(ListFilesResult {
        directory: relative.to_string(),
        total: entries.len(),
        entries,
        truncated,
    })
}

#[tool_router]
impl EspIdfToolHandler {
    // ------------------------------------------------------------------------
    // project lifecycle
    // ------------------------------------------------------------------------

    #[tool(description = "List supported ESP32 target chips")]
    async fn list_targets(
        &self,
        Parameters(_args): Parameters<ListTargetsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = ListTargetsResult {
            targets: commands::targets(),
        };
        info!("Listed {} ESP32 targets", result.targets.len());
        to_result(&result)
    }

    #[tool(description = "Create a new ESP-IDF project from the default template. Runs 'idf.py create-project'.")]
    async fn create_esp_project(
        &self,
        Parameters(args): Parameters<CreateProjectArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Creating project '{}' in {}", args.project_name, args.project_path);

        let trimmed = args.project_path.trim();
        if trimmed.is_empty() {
            return Err(ToolError::validation("project_path", "path is required").into());
        }
        let project_dir = PathBuf::from(trimmed);
        let idf_args = project::create(&project_dir, &args.project_name, self.config.host_shell)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;

        fs::create_dir_all(&project_dir).map_err(ToolError::from)?;
        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        to_result(&output)
    }

    #[tool(description = "Set the target chip for an ESP-IDF project. Runs 'idf.py set-target', which regenerates sdkconfig for the chip.")]
    async fn setup_project_esp_target(
        &self,
        Parameters(args): Parameters<SetTargetArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Setting target '{}' for {}", args.target, args.project_path);

        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let idf_args = project::set_target(&args.target)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        to_result(&output)
    }

    #[tool(description = "Inspect an ESP-IDF project: CMakeLists/sdkconfig presence, configured target, components and source counts")]
    async fn get_project_info(
        &self,
        Parameters(args): Parameters<ProjectPathArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let info = project::project_info(&project_dir);
        info!("Project {} has {} components", project_dir.display(), info.components.len());
        to_result(&info)
    }

    #[tool(description = "List the components of an ESP-IDF project (main, components/*, managed_components/*)")]
    async fn list_components(
        &self,
        Parameters(args): Parameters<ProjectPathArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let components = project::list_components(&project_dir);
        to_result(&ListComponentsResult {
            total: components.len(),
            components,
        })
    }

    // ------------------------------------------------------------------------
    // build / flash
    // ------------------------------------------------------------------------

    #[tool(description = "Build an ESP-IDF project. Runs 'idf.py build' and returns the output with a parsed summary of errors and warnings. sdkconfig_defaults takes ';'-separated files, later ones overriding earlier ones.")]
    async fn build_esp_project(
        &self,
        Parameters(args): Parameters<BuildArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Building {}", args.project_path);

        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let defaults = build::defaults_list(args.sdkconfig_defaults.as_deref());
        let idf_args = build::build(&defaults, self.config.host_shell);
        let toolchain = self.toolchain(args.idf_path.as_deref())?;

        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        let summary = build_log::parse(&output.text(), Some(output.exit_code), &self.config.limits);

        to_result(&BuildResult {
            artifact_dir: build::artifact_dir(&project_dir).map(|p| p.display().to_string()),
            output,
            summary,
        })
    }

    #[tool(description = "Remove build artifacts. Runs 'idf.py clean', or 'idf.py fullclean' when full_clean is set.")]
    async fn clean_esp_project(
        &self,
        Parameters(args): Parameters<CleanArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let idf_args = build::clean(args.full_clean);
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        to_result(&output)
    }

    #[tool(description = "Flash a built project to a connected device. Runs 'idf.py flash' (bootloader, partition table and app).")]
    async fn flash_esp_project(
        &self,
        Parameters(args): Parameters<FlashArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let idf_args = build::flash(port.as_deref(), args.baud.or(self.config.flash_baud))?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        to_result(&output)
    }

    #[tool(description = "Erase the entire flash of a connected device. Runs 'idf.py erase-flash'.")]
    async fn erase_flash_esp(
        &self,
        Parameters(args): Parameters<FlashArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let idf_args = build::erase_flash(port.as_deref(), args.baud.or(self.config.flash_baud))?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        to_result(&output)
    }

    #[tool(description = "Flash the project and then capture serial output for duration_seconds (default 60). Runs 'idf.py flash monitor'; the captured output is parsed as a device log.")]
    async fn flash_and_monitor_esp(
        &self,
        Parameters(args): Parameters<FlashMonitorArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let idf_args = build::flash_and_monitor(port.as_deref(), args.baud)?;
        let window = self.capture_window(Some(args.duration_seconds))?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;

        let capture = self.capture_idf(&toolchain, &project_dir, &idf_args, window).await?;
        let limits = &self.config.limits;
        let log = device_log::parse(&capture.text(), None, limits.max_log_entries, limits.max_crashes);

        info!("Flash and monitor captured {} log entries", log.total_entries);
        to_result(&MonitorResult {
            port,
            duration_seconds: window.as_secs(),
            capture,
            log,
        })
    }

    // ------------------------------------------------------------------------
    // device I/O
    // ------------------------------------------------------------------------

    #[tool(description = "List serial ports with USB VID:PID and the USB-UART bridge chip when known")]
    async fn list_esp_serial_ports(
        &self,
        Parameters(_args): Parameters<ListPortsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let listing = device::list_ports();
        info!("Found {} serial ports ({})", listing.ports.len(), listing.source);
        to_result(&listing)
    }

    #[tool(description = "Capture serial output from a running device for duration_seconds without resetting it. Runs 'idf.py monitor --no-reset' and parses the output into log entries and crash reports.")]
    async fn monitor_esp(
        &self,
        Parameters(args): Parameters<MonitorArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let idf_args = device::monitor(port.as_deref(), args.baud)?;
        let filter = level_filter(args.filter_level.as_deref())?;
        let window = self.capture_window(args.duration_seconds)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;

        let capture = self.capture_idf(&toolchain, &project_dir, &idf_args, window).await?;
        let limits = &self.config.limits;
        let log = device_log::parse(&capture.text(), filter, limits.max_log_entries, limits.max_crashes);

        info!("Monitor captured {} log entries in {}s", log.total_entries, window.as_secs());
        to_result(&MonitorResult {
            port,
            duration_seconds: window.as_secs(),
            capture,
            log,
        })
    }

    // ------------------------------------------------------------------------
    // configuration
    // ------------------------------------------------------------------------

    #[tool(description = "Open the project configuration menu. menuconfig needs a terminal, so by default this returns the command to run; with non_interactive it runs 'idf.py reconfigure' instead.")]
    async fn menuconfig_esp(
        &self,
        Parameters(args): Parameters<MenuconfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;

        let result = if args.non_interactive {
            let output = self
                .run_idf(&toolchain, &project_dir, &configure::reconfigure(), self.config.command_timeout)
                .await?;
            MenuconfigResult {
                interactive: false,
                message: "Ran 'idf.py reconfigure' to regenerate sdkconfig".to_string(),
                command: None,
                output: Some(output),
            }
        } else {
            let ctx = toolchain.context(&project_dir, None);
            MenuconfigResult {
                interactive: true,
                message: "menuconfig is interactive; run this command in a terminal".to_string(),
                command: Some(ctx.interactive_command(self.config.host_shell, &configure::menuconfig())),
                output: None,
            }
        };
        to_result(&result)
    }

    #[tool(description = "Read the project's sdkconfig: one key (config_key, CONFIG_ prefix optional) or the first max_entries entries")]
    async fn get_project_config(
        &self,
        Parameters(args): Parameters<GetConfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let view = configure::project_config(&project_dir, args.config_key.as_deref(), args.max_entries)?;
        to_result(&view)
    }

    #[tool(description = "Use a custom partition table CSV from the project. Rewrites the partition keys in sdkconfig and runs 'idf.py reconfigure'.")]
    async fn set_esp_partition(
        &self,
        Parameters(args): Parameters<SetPartitionArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let partition_csv = configure::apply_partition_table(&project_dir, &args.partition_csv)?;
        info!("Partition table set to {} for {}", partition_csv, project_dir.display());

        let reconfigure = self
            .run_idf(&toolchain, &project_dir, &configure::reconfigure(), self.config.command_timeout)
            .await?;
        to_result(&SetPartitionResult {
            partition_csv,
            reconfigure,
        })
    }

    #[tool(description = "Report the ESP-IDF version from version.txt or 'git describe'")]
    async fn get_esp_idf_version(
        &self,
        Parameters(args): Parameters<IdfPathArgs>,
    ) -> Result<CallToolResult, McpError> {
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let idf_path = toolchain.root.display().to_string();

        if let Some(version) = configure::version_file(&toolchain.root) {
            return to_result(&VersionResult {
                idf_path,
                version,
                source: "version.txt",
            });
        }

        let ctx = toolchain.context(&toolchain.root, Some(self.config.command_timeout));
        let result = ctx.run(&configure::git_describe()).await?;
        let version = if result.success() {
            result.stdout.trim().to_string()
        } else {
            warn!("git describe failed in {}: {}", idf_path, result.stderr.trim());
            "unknown".to_string()
        };
        to_result(&VersionResult {
            idf_path,
            version,
            source: "git",
        })
    }

    #[tool(description = "Check which ESP-IDF installation would be used and whether it is complete. Reports problems instead of failing.")]
    async fn check_esp_idf_env(
        &self,
        Parameters(args): Parameters<IdfPathArgs>,
    ) -> Result<CallToolResult, McpError> {
        let report = configure::check_environment(args.idf_path.as_deref(), self.config.idf_path.as_deref());
        if !report.ok {
            warn!("ESP-IDF environment check failed: {:?}", report.error);
        }
        to_result(&report)
    }

    #[tool(description = "Install ESP-IDF tools by running install.sh, optionally for specific chips ('esp32,esp32c3' or 'all')")]
    async fn run_esp_idf_install(
        &self,
        Parameters(args): Parameters<InstallArgs>,
    ) -> Result<CallToolResult, McpError> {
        let targets = configure::install_targets(args.targets.as_deref())?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let argv = configure::install(&toolchain, &targets, self.config.host_shell)?;

        info!("Running ESP-IDF install in {}", toolchain.root.display());
        let ctx = toolchain.context(&toolchain.root, Some(self.config.install_timeout));
        let result = ctx.run(&argv).await?;
        let output = CommandOutput::new(argv.join(" "), result);
        if !output.success {
            error!("install.sh failed with exit code {}", output.exit_code);
        }
        to_result(&output)
    }

    // ------------------------------------------------------------------------
    // debugging
    // ------------------------------------------------------------------------

    #[tool(description = "Start 'idf.py gdb' against a running OpenOCD session, stopped after timeout_seconds. Also returns the command for an interactive session.")]
    async fn gdb_attach(
        &self,
        Parameters(args): Parameters<GdbArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let window = match args.timeout_seconds {
            Some(0) => return Err(ToolError::validation("timeout_seconds", "must be at least 1 second").into()),
            Some(s) => Duration::from_secs(s),
            None => self.config.gdb_timeout,
        };
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let idf_args = debugging::gdb();

        let interactive_command = toolchain
            .context(&project_dir, None)
            .interactive_command(self.config.host_shell, &idf_args);
        let capture = self.capture_idf(&toolchain, &project_dir, &idf_args, window).await?;
        to_result(&GdbResult {
            interactive_command,
            capture,
        })
    }

    #[tool(description = "Analyze a core dump with 'idf.py coredump-info', from a saved core_file or read from the device flash")]
    async fn get_core_dump(
        &self,
        Parameters(args): Parameters<CoreDumpArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let source = debugging::CoreDumpSource::from_args(args.core_file.as_deref(), port.as_deref());

        if matches!(source, debugging::CoreDumpSource::Device { .. }) {
            let sdkconfig_text = fs::read_to_string(project_dir.join("sdkconfig")).unwrap_or_default();
            if !debugging::coredump_enabled(&sdkconfig_text) {
                info!("Core dumps disabled for {}", project_dir.display());
                return to_result(&debugging::enable_instructions());
            }
        }

        let idf_args = debugging::coredump_info(&source, &project_dir, self.config.host_shell)?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;
        let output = self
            .run_idf(&toolchain, &project_dir, &idf_args, self.config.command_timeout)
            .await?;
        to_result(&output)
    }

    // ------------------------------------------------------------------------
    // runtime analysis
    // ------------------------------------------------------------------------

    #[tool(description = "Capture serial output and extract heap figures (free, minimum free, largest block) printed by the application")]
    async fn get_heap_info(
        &self,
        Parameters(args): Parameters<DeviceCaptureArgs>,
    ) -> Result<CallToolResult, McpError> {
        let (port, window, capture) = self.device_capture(&args).await?;
        let limits = &self.config.limits;
        let log = device_log::parse(&capture.text(), None, limits.max_log_entries, limits.max_crashes);
        let samples = device_log::heap_samples(&log);
        let note = samples.is_empty().then(|| {
            "No heap figures in the captured output; print esp_get_free_heap_size() or \
             heap_caps_print_heap_info() from the application"
                .to_string()
        });

        to_result(&HeapInfoResult {
            port,
            duration_seconds: window.as_secs(),
            timed_out: capture.timed_out,
            lowest_free_bytes: samples.iter().filter_map(|s| s.free_bytes).min(),
            samples,
            log,
            note,
        })
    }

    #[tool(description = "Capture serial output and parse FreeRTOS vTaskList / vTaskGetRunTimeStats tables printed by the application")]
    async fn get_task_stats(
        &self,
        Parameters(args): Parameters<DeviceCaptureArgs>,
    ) -> Result<CallToolResult, McpError> {
        let (port, window, capture) = self.device_capture(&args).await?;
        let stats = task_stats::parse(&capture.text());
        let note = (stats.tasks.is_empty() && stats.runtime.is_empty()).then(|| {
            "No task tables found; enable CONFIG_FREERTOS_USE_TRACE_FACILITY and \
             CONFIG_FREERTOS_GENERATE_RUN_TIME_STATS and print vTaskList() from the application"
                .to_string()
        });

        to_result(&TaskStatsResult {
            port,
            duration_seconds: window.as_secs(),
            timed_out: capture.timed_out,
            stats,
            note,
        })
    }

    // ------------------------------------------------------------------------
    // testing
    // ------------------------------------------------------------------------

    #[tool(description = "Run pytest-embedded tests for the project against a target chip")]
    async fn run_pytest(
        &self,
        Parameters(args): Parameters<PytestArgs>,
    ) -> Result<CallToolResult, McpError> {
        let project_dir = commands::existing_dir("project_path", &args.project_path)?;
        let port = self.port(args.port.as_deref());
        let argv = testing::pytest(
            args.test_path.as_deref(),
            &args.target,
            port.as_deref(),
            &args.extra_args,
            self.config.host_shell,
        )?;
        let toolchain = self.toolchain(args.idf_path.as_deref())?;

        let ctx = toolchain.context(&project_dir, Some(self.config.command_timeout));
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| ToolError::validation("test_path", "empty pytest command"))?;
        let wrapped = ctx.sourced_argv(self.config.host_shell, program, rest)?;
        let output = CommandOutput::new(argv.join(" "), ctx.run(&wrapped).await?);
        if output.success {
            info!("pytest passed for {}", project_dir.display());
        } else {
            error!("pytest failed with exit code {}", output.exit_code);
        }
        to_result(&output)
    }

    // ------------------------------------------------------------------------
    // file operations
    // ------------------------------------------------------------------------

    #[tool(description = "Read a file inside the project (at most max_lines lines, default 100)")]
    async fn read_file(
        &self,
        Parameters(args): Parameters<ReadFileArgs>,
    ) -> Result<CallToolResult, McpError> {
        let root = commands::existing_dir("project_path", &args.project_path)?;
        let max_lines = args.max_lines.unwrap_or(self.config.limits.default_read_lines);
        to_result(&read_scoped(&root, &args.path, max_lines)?)
    }

    #[tool(description = "Write a file inside the project, replacing its content")]
    async fn write_file(
        &self,
        Parameters(args): Parameters<WriteFileArgs>,
    ) -> Result<CallToolResult, McpError> {
        let root = commands::existing_dir("project_path", &args.project_path)?;
        let result = write_scoped(&root, &args.path, &args.content, args.create_dirs)?;
        info!("Wrote {} bytes to {}", result.bytes_written, result.path);
        to_result(&result)
    }

    #[tool(description = "List files inside the project, optionally recursive and filtered by a name suffix")]
    async fn list_files(
        &self,
        Parameters(args): Parameters<ListFilesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let root = commands::existing_dir("project_path", &args.project_path)?;
        to_result(&list_scoped(&root, args.path.as_deref(), args.recursive, args.pattern.as_deref())?)
    }

    // ------------------------------------------------------------------------
    // analysis
    // ------------------------------------------------------------------------

    #[tool(description = "Parse build output into errors, warnings and progress lines. success is true only when exit_code is 0.")]
    async fn parse_build_log(
        &self,
        Parameters(args): Parameters<ParseBuildLogArgs>,
    ) -> Result<CallToolResult, McpError> {
        let text = text_or_file(args.text, args.log_path.as_deref(), "log_path")?;
        let summary = build_log::parse(&text, args.exit_code, &self.config.limits);
        info!("Build log: {} errors, {} warnings", summary.error_count, summary.warning_count);
        to_result(&summary)
    }

    #[tool(description = "Summarize a GNU ld memory map: memory regions, output section sizes and address ranges, largest contributing objects")]
    async fn analyze_memory_map(
        &self,
        Parameters(args): Parameters<MemoryMapArgs>,
    ) -> Result<CallToolResult, McpError> {
        let text = text_or_file(args.text, args.map_path.as_deref(), "map_path")?;
        let summary = memory_map::parse(&text, self.config.limits.max_contributors);
        info!("Memory map: {} sections, {} bytes", summary.sections.len(), summary.total_size_bytes);
        to_result(&summary)
    }

    #[tool(description = "Compare two sdkconfig files: added, removed and changed keys, categorized")]
    async fn compare_sdkconfig(
        &self,
        Parameters(args): Parameters<CompareSdkconfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let left = text_or_file(args.left_text, args.left_path.as_deref(), "left_path")?;
        let right = text_or_file(args.right_text, args.right_path.as_deref(), "right_path")?;
        let diff = sdkconfig::compare(&left, &right, &self.config.limits);
        info!(
            "sdkconfig diff: {} added, {} removed, {} changed",
            diff.added_count, diff.removed_count, diff.changed_count
        );
        to_result(&diff)
    }

    #[tool(description = "Build the component dependency graph from idf_component_register REQUIRES / PRIV_REQUIRES, reporting cycles and depth")]
    async fn analyze_dependencies(
        &self,
        Parameters(args): Parameters<DependenciesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let components = match (args.cmake_text, args.project_path.as_deref()) {
            (Some(text), _) => {
                let name = args
                    .component
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "main".to_string());
                let deps = dependencies::parse_cmake(&text).unwrap_or_default();
                std::collections::BTreeMap::from([(name, deps)])
            }
            (None, Some(path)) => {
                let project_dir = commands::existing_dir("project_path", path)?;
                project::scan_component_dependencies(&project_dir)
            }
            (None, None) => {
                return Err(ToolError::validation("project_path", "provide project_path or cmake_text").into())
            }
        };

        let report = dependencies::analyze(&components);
        info!(
            "Dependency graph: {} components, {} cycles",
            report.total_components,
            report.cycles.len()
        );
        to_result(&report)
    }

    #[tool(description = "Parse ESP-IDF serial output into log entries with level counts and crash detection, optionally keeping one level")]
    async fn format_device_log(
        &self,
        Parameters(args): Parameters<FormatDeviceLogArgs>,
    ) -> Result<CallToolResult, McpError> {
        let filter = level_filter(args.filter_level.as_deref())?;
        let text = text_or_file(args.text, args.log_path.as_deref(), "log_path")?;
        let limits = &self.config.limits;
        let log = device_log::parse(&text, filter, limits.max_log_entries, limits.max_crashes);
        to_result(&log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::handler::server::tool::Parameters;
    use tempfile::TempDir;

    /// Extract JSON text from a CallToolResult's first content element
    fn extract_json(result: &CallToolResult) -> serde_json::Value {
        let text = &result.content[0].as_text().expect("expected text content").text;
        serde_json::from_str(text).expect("expected valid JSON")
    }

    fn handler_without_idf() -> EspIdfToolHandler {
        EspIdfToolHandler::new(Config {
            idf_path: None,
            default_port: None,
            ..Config::default()
        })
    }

    fn path_str(p: &Path) -> String {
        p.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_list_targets() {
        let handler = EspIdfToolHandler::default();
        let result = handler
            .list_targets(Parameters(ListTargetsArgs {}))
            .await
            .unwrap();

        let parsed = extract_json(&result);
        let targets = parsed["targets"].as_array().unwrap();
        assert_eq!(targets.len(), 10);
        for target in targets {
            let arch = target["arch"].as_str().unwrap();
            assert!(arch == "xtensa" || arch == "riscv", "unexpected arch: {}", arch);
        }
    }

    #[tokio::test]
    async fn test_set_target_rejects_unknown_chip() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_without_idf();
        let err = handler
            .setup_project_esp_target(Parameters(SetTargetArgs {
                project_path: path_str(tmp.path()),
                target: "esp8266".to_string(),
                idf_path: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.unwrap()["field"], "target");
    }

    #[tokio::test]
    async fn test_build_without_idf_path_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_without_idf();
        let err = handler
            .build_esp_project(Parameters(BuildArgs {
                project_path: path_str(tmp.path()),
                sdkconfig_defaults: None,
                idf_path: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["kind"], "configuration_error");
    }

    #[tokio::test]
    async fn test_build_missing_project_dir() {
        let handler = handler_without_idf();
        let err = handler
            .build_esp_project(Parameters(BuildArgs {
                project_path: "/nonexistent/project_xyz".to_string(),
                sdkconfig_defaults: None,
                idf_path: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["field"], "project_path");
    }

    #[tokio::test]
    async fn test_flash_rejects_bad_port() {
        let tmp = TempDir::new().unwrap();
        let handler = handler_without_idf();
        let err = handler
            .flash_esp_project(Parameters(FlashArgs {
                project_path: path_str(tmp.path()),
                port: Some("usb please".to_string()),
                baud: None,
                idf_path: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["field"], "port");
    }

    #[tokio::test]
    async fn test_get_project_info() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("CMakeLists.txt"), "project(app)\n").unwrap();
        fs::write(tmp.path().join("sdkconfig"), "CONFIG_IDF_TARGET=\"esp32s3\"\n").unwrap();
        fs::create_dir_all(tmp.path().join("main")).unwrap();
        fs::write(tmp.path().join("main/app.c"), "").unwrap();

        let handler = EspIdfToolHandler::default();
        let result = handler
            .get_project_info(Parameters(ProjectPathArgs {
                project_path: path_str(tmp.path()),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["target"], "esp32s3");
        assert_eq!(parsed["has_main"], true);
        assert_eq!(parsed["source_files"], 1);
    }

    #[tokio::test]
    async fn test_get_project_config_single_key() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("sdkconfig"), "CONFIG_FREERTOS_HZ=1000\nCONFIG_LOG_DEFAULT_LEVEL=3\n").unwrap();

        let handler = EspIdfToolHandler::default();
        let result = handler
            .get_project_config(Parameters(GetConfigArgs {
                project_path: path_str(tmp.path()),
                config_key: Some("FREERTOS_HZ".to_string()),
                max_entries: None,
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["entries"]["CONFIG_FREERTOS_HZ"], "1000");
        assert_eq!(parsed["total_entries"], 2);
    }

    #[tokio::test]
    async fn test_check_env_reports_instead_of_failing() {
        let handler = handler_without_idf();
        let result = handler
            .check_esp_idf_env(Parameters(IdfPathArgs {
                idf_path: Some("/nonexistent/esp-idf".to_string()),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["error_kind"], "invalid_toolchain_error");
    }

    #[tokio::test]
    async fn test_file_roundtrip_and_escape() {
        let tmp = TempDir::new().unwrap();
        let handler = EspIdfToolHandler::default();
        let project_path = path_str(tmp.path());

        let written = handler
            .write_file(Parameters(WriteFileArgs {
                project_path: project_path.clone(),
                path: "main/notes.txt".to_string(),
                content: "one\ntwo\nthree\n".to_string(),
                create_dirs: true,
            }))
            .await
            .unwrap();
        assert_eq!(extract_json(&written)["bytes_written"], 14);

        let read = handler
            .read_file(Parameters(ReadFileArgs {
                project_path: project_path.clone(),
                path: "main/notes.txt".to_string(),
                max_lines: Some(2),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&read);
        assert_eq!(parsed["content"], "one\ntwo");
        assert_eq!(parsed["total_lines"], 3);
        assert_eq!(parsed["truncated"], true);

        let err = handler
            .read_file(Parameters(ReadFileArgs {
                project_path: project_path.clone(),
                path: "../../etc/passwd".to_string(),
                max_lines: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["field"], "path");

        let err = handler
            .write_file(Parameters(WriteFileArgs {
                project_path,
                path: "/etc/evil.txt".to_string(),
                content: String::new(),
                create_dirs: true,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_through_dangling_symlink_rejected() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, tmp.path().join("evil")).unwrap();

        let err = EspIdfToolHandler::default()
            .write_file(Parameters(WriteFileArgs {
                project_path: path_str(tmp.path()),
                path: "evil".to_string(),
                content: "x".to_string(),
                create_dirs: false,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_list_files_pattern() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("main")).unwrap();
        fs::write(tmp.path().join("main/app.c"), "int x;").unwrap();
        fs::write(tmp.path().join("main/app.h"), "").unwrap();
        fs::write(tmp.path().join("README.md"), "").unwrap();

        let handler = EspIdfToolHandler::default();
        let result = handler
            .list_files(Parameters(ListFilesArgs {
                project_path: path_str(tmp.path()),
                path: None,
                recursive: true,
                pattern: Some(".c".to_string()),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        let entries = parsed["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["path"], "main/app.c");
        assert_eq!(entries[0]["size_bytes"], 6);
    }

    #[tokio::test]
    async fn test_parse_build_log_needs_exit_code_for_success() {
        let handler = EspIdfToolHandler::default();
        let result = handler
            .parse_build_log(Parameters(ParseBuildLogArgs {
                text: Some(String::new()),
                log_path: None,
                exit_code: None,
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["success"], false);
        assert!(parsed["errors"].as_array().unwrap().is_empty());

        let result = handler
            .parse_build_log(Parameters(ParseBuildLogArgs {
                text: Some(String::new()),
                log_path: None,
                exit_code: Some(0),
            }))
            .await
            .unwrap();
        assert_eq!(extract_json(&result)["success"], true);
    }

    #[tokio::test]
    async fn test_analysis_requires_input() {
        let handler = EspIdfToolHandler::default();
        let err = handler
            .analyze_memory_map(Parameters(MemoryMapArgs {
                text: None,
                map_path: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["field"], "map_path");
    }

    #[tokio::test]
    async fn test_compare_sdkconfig_from_files() {
        let tmp = TempDir::new().unwrap();
        let left = tmp.path().join("sdkconfig.old");
        let right = tmp.path().join("sdkconfig");
        fs::write(&left, "CONFIG_X=1\nCONFIG_Y=2\n").unwrap();
        fs::write(&right, "CONFIG_X=1\nCONFIG_Y=3\nCONFIG_Z=4\n").unwrap();

        let handler = EspIdfToolHandler::default();
        let result = handler
            .compare_sdkconfig(Parameters(CompareSdkconfigArgs {
                left_text: None,
                left_path: Some(path_str(&left)),
                right_text: None,
                right_path: Some(path_str(&right)),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["added"][0]["key"], "CONFIG_Z");
        assert_eq!(parsed["changed"][0]["old_value"], "2");
        assert_eq!(parsed["changed"][0]["new_value"], "3");
        assert!(parsed["removed"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_dependencies_from_text() {
        let handler = EspIdfToolHandler::default();
        let result = handler
            .analyze_dependencies(Parameters(DependenciesArgs {
                project_path: None,
                cmake_text: Some("idf_component_register(SRCS \"a.c\" REQUIRES driver PRIV_REQUIRES log)".to_string()),
                component: Some("sensor".to_string()),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["total_components"], 1);
        assert_eq!(parsed["graph"]["sensor"], serde_json::json!(["driver", "log"]));
    }

    #[tokio::test]
    async fn test_format_device_log_filter() {
        let handler = EspIdfToolHandler::default();
        let text = "I (10) boot: start\nE (20) app: failed\n".to_string();
        let result = handler
            .format_device_log(Parameters(FormatDeviceLogArgs {
                text: Some(text.clone()),
                log_path: None,
                filter_level: Some("error".to_string()),
            }))
            .await
            .unwrap();
        let parsed = extract_json(&result);
        assert_eq!(parsed["entries"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["entries"][0]["tag"], "app");

        let err = handler
            .format_device_log(Parameters(FormatDeviceLogArgs {
                text: Some(text),
                log_path: None,
                filter_level: Some("loud".to_string()),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["field"], "filter_level");
    }

    #[cfg(unix)]
    mod fake_toolchain {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// An ESP-IDF root whose export.sh puts a scripted `idf.py` on PATH
        fn fake_idf(idf_py_body: &str) -> TempDir {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path();
            fs::create_dir_all(root.join("tools")).unwrap();
            fs::write(root.join("tools/idf.py"), "").unwrap();
            fs::create_dir_all(root.join("fakebin")).unwrap();
            fs::write(root.join("export.sh"), "export PATH=\"$IDF_PATH/fakebin:$PATH\"\n").unwrap();

            let script = root.join("fakebin/idf.py");
            fs::write(&script, format!("#!/bin/sh\n{}\n", idf_py_body)).unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
            tmp
        }

        #[tokio::test]
        async fn test_failed_build_is_data_not_error() {
            let idf = fake_idf("echo \"main/app.c:3:5: error: expected ';' before '}' token\" >&2\nexit 1");
            let project = TempDir::new().unwrap();

            let handler = handler_without_idf();
            let result = handler
                .build_esp_project(Parameters(BuildArgs {
                    project_path: path_str(project.path()),
                    sdkconfig_defaults: Some("a.defaults;b.defaults".to_string()),
                    idf_path: Some(path_str(idf.path())),
                }))
                .await
                .unwrap();

            let parsed = extract_json(&result);
            assert_eq!(parsed["exit_code"], 1);
            assert_eq!(parsed["success"], false);
            assert_eq!(parsed["command"], "idf.py -DSDKCONFIG_DEFAULTS=a.defaults;b.defaults build");
            assert_eq!(parsed["summary"]["success"], false);
            assert_eq!(parsed["summary"]["error_count"], 1);
            assert_eq!(parsed["summary"]["errors"][0]["file"], "main/app.c");
            assert!(parsed["artifact_dir"].is_null());
        }

        #[tokio::test]
        async fn test_idf_args_reach_the_tool_unchanged() {
            let idf = fake_idf("printf '%s|' \"$@\"");
            let project = TempDir::new().unwrap();

            let handler = handler_without_idf();
            let result = handler
                .flash_esp_project(Parameters(FlashArgs {
                    project_path: path_str(project.path()),
                    port: Some("/dev/ttyUSB0".to_string()),
                    baud: Some(921600),
                    idf_path: Some(path_str(idf.path())),
                }))
                .await
                .unwrap();

            let parsed = extract_json(&result);
            assert_eq!(parsed["success"], true);
            assert_eq!(parsed["stdout"], "-p|/dev/ttyUSB0|-b|921600|flash|");
        }

        #[tokio::test]
        async fn test_monitor_window_returns_partial_output() {
            let idf = fake_idf("echo 'I (10) boot: hello'\necho 'E (20) app: sensor missing'\nexec sleep 5");
            let project = TempDir::new().unwrap();

            let handler = handler_without_idf();
            let result = handler
                .monitor_esp(Parameters(MonitorArgs {
                    project_path: path_str(project.path()),
                    port: None,
                    baud: None,
                    duration_seconds: Some(1),
                    filter_level: None,
                    idf_path: Some(path_str(idf.path())),
                }))
                .await
                .unwrap();

            let parsed = extract_json(&result);
            assert_eq!(parsed["timed_out"], true);
            assert!(parsed["exit_code"].is_null());
            assert_eq!(parsed["log"]["total_entries"], 2);
            assert_eq!(parsed["log"]["level_counts"]["ERROR"], 1);
        }

        #[tokio::test]
        async fn test_menuconfig_returns_interactive_command() {
            let idf = fake_idf("exit 0");
            let project = TempDir::new().unwrap();

            let handler = handler_without_idf();
            let result = handler
                .menuconfig_esp(Parameters(MenuconfigArgs {
                    project_path: path_str(project.path()),
                    non_interactive: false,
                    idf_path: Some(path_str(idf.path())),
                }))
                .await
                .unwrap();

            let parsed = extract_json(&result);
            assert_eq!(parsed["interactive"], true);
            assert!(parsed["command"].as_str().unwrap().ends_with("idf.py menuconfig"));
        }
    }
}

#[tool_handler]
impl ServerHandler for EspIdfToolHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "ESP-IDF MCP Server - create, build, flash, monitor, debug and test ESP-IDF projects, \
                 and analyze build logs, memory maps, sdkconfig files, component dependencies and device logs. \
                 Toolchain failures such as compile errors are returned as results with a non-zero exit_code."
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        info!(
            "ESP-IDF MCP server initialized with {} tools",
            self.tool_router.list_all().len()
        );
        Ok(self.get_info())
    }
}
