//! Type definitions for ESP-IDF MCP tools

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

use crate::commands::TargetInfo;
use crate::parsers::build_log::BuildLogSummary;
use crate::parsers::device_log::{DeviceLog, HeapSample};
use crate::parsers::task_stats::TaskStats;
use crate::runner::{join_streams, CommandResult};

fn default_flash_monitor_duration() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Outcome of a toolchain command. `success` mirrors the exit code.
#[derive(Debug, Serialize)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: i32,
    pub duration_seconds: f64,
    /// The command as it would be typed (without the environment wrapper)
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(command: String, result: CommandResult) -> Self {
        Self {
            success: result.success(),
            exit_code: result.exit_code,
            duration_seconds: result.duration_seconds,
            command,
            stdout: result.stdout,
            stderr: result.stderr,
        }
    }

    pub fn text(&self) -> String {
        join_streams(&self.stdout, &self.stderr)
    }
}

/// Output of a bounded capture. Running out the clock is the normal way
/// for a monitor session to end.
#[derive(Debug, Serialize)]
pub struct Capture {
    pub timed_out: bool,
    /// `None` when the capture window closed first
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Capture {
    pub fn text(&self) -> String {
        join_streams(&self.stdout, &self.stderr)
    }
}

// ============================================================================
// list_targets
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTargetsArgs {}

#[derive(Debug, Serialize)]
pub struct ListTargetsResult {
    pub targets: Vec<TargetInfo>,
}

// ============================================================================
// create_esp_project
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectArgs {
    /// Directory for the new project (created if missing)
    pub project_path: String,
    /// Project name: letters, digits, '_' and '-'
    pub project_name: String,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// setup_project_esp_target
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetTargetArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Target chip (e.g., "esp32s3", "esp32c3")
    pub target: String,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// get_project_info / list_components
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProjectPathArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
}

#[derive(Debug, Serialize)]
pub struct ListComponentsResult {
    pub total: usize,
    pub components: Vec<crate::commands::project::ComponentSummary>,
}

// ============================================================================
// build_esp_project
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BuildArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// SDKCONFIG_DEFAULTS files separated by ';' (later files override earlier ones)
    #[serde(default)]
    pub sdkconfig_defaults: Option<String>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildResult {
    #[serde(flatten)]
    pub output: CommandOutput,
    /// Build directory, present once flasher_args.json exists
    pub artifact_dir: Option<String>,
    pub summary: BuildLogSummary,
}

// ============================================================================
// clean_esp_project
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CleanArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Run 'fullclean' (removes the whole build directory) instead of 'clean'
    #[serde(default)]
    pub full_clean: bool,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// flash_esp_project / erase_flash_esp
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FlashArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Serial port (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate for flashing
    #[serde(default)]
    pub baud: Option<u32>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// flash_and_monitor_esp / monitor_esp / get_heap_info / get_task_stats
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FlashMonitorArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Serial port (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate for flashing and monitoring
    #[serde(default)]
    pub baud: Option<u32>,
    /// Seconds to run before the session is stopped (default: 60)
    #[serde(default = "default_flash_monitor_duration")]
    pub duration_seconds: u64,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MonitorArgs {
    /// Path to the ESP-IDF project (its ELF is used to decode addresses)
    pub project_path: String,
    /// Serial port (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default)]
    pub port: Option<String>,
    /// Monitor baud rate
    #[serde(default)]
    pub baud: Option<u32>,
    /// Seconds to capture (default: server serial timeout)
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    /// Keep only entries at this level (E, W, I, D, V)
    #[serde(default)]
    pub filter_level: Option<String>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeviceCaptureArgs {
    /// Path to the ESP-IDF project running on the device
    pub project_path: String,
    /// Serial port (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default)]
    pub port: Option<String>,
    /// Monitor baud rate
    #[serde(default)]
    pub baud: Option<u32>,
    /// Seconds to capture (default: server serial timeout)
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MonitorResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub duration_seconds: u64,
    #[serde(flatten)]
    pub capture: Capture,
    pub log: DeviceLog,
}

#[derive(Debug, Serialize)]
pub struct HeapInfoResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub duration_seconds: u64,
    pub timed_out: bool,
    pub samples: Vec<HeapSample>,
    /// Smallest free-heap figure seen in the capture
    pub lowest_free_bytes: Option<u64>,
    pub log: DeviceLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskStatsResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub duration_seconds: u64,
    pub timed_out: bool,
    pub stats: TaskStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ============================================================================
// list_esp_serial_ports
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPortsArgs {}

// ============================================================================
// menuconfig_esp
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MenuconfigArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Run 'idf.py reconfigure' instead of returning the interactive command
    #[serde(default)]
    pub non_interactive: bool,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MenuconfigResult {
    pub interactive: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CommandOutput>,
}

// ============================================================================
// get_project_config
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetConfigArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// A single key, with or without the CONFIG_ prefix
    #[serde(default)]
    pub config_key: Option<String>,
    /// Maximum entries returned when no key is given (default: 100)
    #[serde(default)]
    pub max_entries: Option<usize>,
}

// ============================================================================
// set_esp_partition
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetPartitionArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Partition table CSV, relative to the project
    pub partition_csv: String,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetPartitionResult {
    pub partition_csv: String,
    pub reconfigure: CommandOutput,
}

// ============================================================================
// get_esp_idf_version / check_esp_idf_env
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IdfPathArgs {
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VersionResult {
    pub idf_path: String,
    pub version: String,
    /// "version.txt" or "git"
    pub source: &'static str,
}

// ============================================================================
// run_esp_idf_install
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InstallArgs {
    /// Comma-separated chips to install tools for, or "all" (default: install.sh default)
    #[serde(default)]
    pub targets: Option<String>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// gdb_attach
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GdbArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Seconds before the debugger session is stopped (default: server gdb timeout)
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GdbResult {
    /// Run this in a terminal for an interactive session
    pub interactive_command: String,
    #[serde(flatten)]
    pub capture: Capture,
}

// ============================================================================
// get_core_dump
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CoreDumpArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Saved core dump file; when absent the dump is read from the device
    #[serde(default)]
    pub core_file: Option<String>,
    /// Serial port for reading from the device
    #[serde(default)]
    pub port: Option<String>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// run_pytest
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PytestArgs {
    /// Path to the ESP-IDF project
    pub project_path: String,
    /// Target chip the tests run against
    pub target: String,
    /// Test file or directory, relative to the project (default: ".")
    #[serde(default)]
    pub test_path: Option<String>,
    /// Serial port of the device under test
    #[serde(default)]
    pub port: Option<String>,
    /// Extra pytest arguments, one per element and passed verbatim
    /// (e.g. `["-k", "smoke and not slow"]`)
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Override the ESP-IDF installation path
    #[serde(default)]
    pub idf_path: Option<String>,
}

// ============================================================================
// read_file / write_file / list_files
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Project root; the path may not leave it
    pub project_path: String,
    /// File path relative to the project root
    pub path: String,
    /// Maximum lines returned (default: 100)
    #[serde(default)]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReadFileResult {
    pub path: String,
    pub total_lines: usize,
    pub lines_returned: usize,
    pub truncated: bool,
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// Project root; the path may not leave it
    pub project_path: String,
    /// File path relative to the project root
    pub path: String,
    /// Full file content
    pub content: String,
    /// Create missing parent directories (default: true)
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

#[derive(Debug, Serialize)]
pub struct WriteFileResult {
    pub path: String,
    pub bytes_written: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListFilesArgs {
    /// Project root; the path may not leave it
    pub project_path: String,
    /// Directory relative to the project root (default: the root)
    #[serde(default)]
    pub path: Option<String>,
    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: bool,
    /// Only list files whose name ends with this suffix (e.g., ".c")
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct FileEntry {
    /// Path relative to the project root
    pub path: String,
    pub is_dir: bool,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResult {
    pub directory: String,
    pub total: usize,
    pub entries: Vec<FileEntry>,
    pub truncated: bool,
}

// ============================================================================
// parse_build_log
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ParseBuildLogArgs {
    /// Raw build output
    #[serde(default)]
    pub text: Option<String>,
    /// Path to a saved build log (used when text is absent)
    #[serde(default)]
    pub log_path: Option<String>,
    /// Exit status of the build, if known; without it success is false
    #[serde(default)]
    pub exit_code: Option<i32>,
}

// ============================================================================
// analyze_memory_map
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MemoryMapArgs {
    /// Raw linker map text
    #[serde(default)]
    pub text: Option<String>,
    /// Path to a .map file (used when text is absent)
    #[serde(default)]
    pub map_path: Option<String>,
}

// ============================================================================
// compare_sdkconfig
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompareSdkconfigArgs {
    /// Left (old) sdkconfig text
    #[serde(default)]
    pub left_text: Option<String>,
    /// Left (old) sdkconfig file
    #[serde(default)]
    pub left_path: Option<String>,
    /// Right (new) sdkconfig text
    #[serde(default)]
    pub right_text: Option<String>,
    /// Right (new) sdkconfig file
    #[serde(default)]
    pub right_path: Option<String>,
}

// ============================================================================
// analyze_dependencies
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DependenciesArgs {
    /// Project to scan for component CMakeLists.txt files
    #[serde(default)]
    pub project_path: Option<String>,
    /// A single CMakeLists.txt body to analyze instead of a project
    #[serde(default)]
    pub cmake_text: Option<String>,
    /// Component name for cmake_text (default: "main")
    #[serde(default)]
    pub component: Option<String>,
}

// ============================================================================
// format_device_log
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FormatDeviceLogArgs {
    /// Raw serial output
    #[serde(default)]
    pub text: Option<String>,
    /// Path to a saved serial log (used when text is absent)
    #[serde(default)]
    pub log_path: Option<String>,
    /// Keep only entries at this level (E, W, I, D, V)
    #[serde(default)]
    pub filter_level: Option<String>,
}
