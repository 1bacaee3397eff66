//! Configuration for the esp-idf-mcp server

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;

use crate::paths::HostShell;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "esp-idf-mcp")]
#[command(about = "MCP server for ESP-IDF project, build, flash and analysis tools")]
#[command(version)]
pub struct Args {
    /// ESP-IDF path used when a tool call does not pass idf_path
    #[arg(long, env = "IDF_PATH")]
    pub idf_path: Option<PathBuf>,

    /// Default serial port for flash/monitor
    #[arg(long, env = "ESPPORT")]
    pub port: Option<String>,

    /// Timeout for build, flash and other toolchain commands (seconds)
    #[arg(long, env = "ESP_MCP_TIMEOUT", default_value_t = 300)]
    pub command_timeout: u64,

    /// Default serial capture window for monitor tools (seconds)
    #[arg(long, env = "ESP_MCP_SERIAL_TIMEOUT", default_value_t = 10)]
    pub serial_timeout: u64,

    /// Timeout for debugger attach (seconds)
    #[arg(long, env = "ESP_MCP_GDB_TIMEOUT", default_value_t = 600)]
    pub gdb_timeout: u64,

    /// Timeout for install.sh (seconds)
    #[arg(long, env = "ESP_MCP_INSTALL_TIMEOUT", default_value_t = 1800)]
    pub install_timeout: u64,

    /// Baud rate for flash/erase when a call does not pass one
    #[arg(long, env = "ESP_MCP_FLASH_BAUD")]
    pub flash_baud: Option<u32>,

    /// Maximum build errors reported by log analysis
    #[arg(long, env = "ESP_MCP_MAX_ERRORS", default_value_t = 20)]
    pub max_errors: usize,

    /// Maximum build warnings reported by log analysis
    #[arg(long, env = "ESP_MCP_MAX_WARNINGS", default_value_t = 20)]
    pub max_warnings: usize,

    /// Maximum device log entries reported
    #[arg(long, env = "ESP_MCP_MAX_LOG_ENTRIES", default_value_t = 200)]
    pub max_log_entries: usize,

    /// Rewrite drive-letter paths (E:/x -> /e/x) for a Unix-like shell on Windows
    #[arg(long)]
    pub posix_shell_paths: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file path (defaults to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Caps applied to analysis output
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_errors: usize,
    pub max_warnings: usize,
    pub max_log_entries: usize,
    pub max_crashes: usize,
    pub max_contributors: usize,
    pub max_added_configs: usize,
    pub max_removed_configs: usize,
    pub max_changed_configs: usize,
    pub default_read_lines: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_errors: 20,
            max_warnings: 20,
            max_log_entries: 200,
            max_crashes: 10,
            max_contributors: 50,
            max_added_configs: 50,
            max_removed_configs: 50,
            max_changed_configs: 100,
            default_read_lines: 100,
        }
    }
}

/// Runtime configuration derived from CLI args.
///
/// Built once at startup and never mutated; every tool call reads its
/// defaults from here instead of from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub idf_path: Option<PathBuf>,
    pub default_port: Option<String>,
    pub command_timeout: Duration,
    pub serial_timeout: Duration,
    pub gdb_timeout: Duration,
    pub install_timeout: Duration,
    pub flash_baud: Option<u32>,
    pub host_shell: HostShell,
    pub limits: Limits,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        let host_shell = if args.posix_shell_paths {
            HostShell::PosixOnWindows
        } else {
            HostShell::detect()
        };

        Self {
            idf_path: args.idf_path.clone(),
            default_port: args.port.clone(),
            command_timeout: Duration::from_secs(args.command_timeout),
            serial_timeout: Duration::from_secs(args.serial_timeout),
            gdb_timeout: Duration::from_secs(args.gdb_timeout),
            install_timeout: Duration::from_secs(args.install_timeout),
            flash_baud: args.flash_baud,
            host_shell,
            limits: Limits {
                max_errors: args.max_errors,
                max_warnings: args.max_warnings,
                max_log_entries: args.max_log_entries,
                ..Limits::default()
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idf_path: None,
            default_port: None,
            command_timeout: Duration::from_secs(300),
            serial_timeout: Duration::from_secs(10),
            gdb_timeout: Duration::from_secs(600),
            install_timeout: Duration::from_secs(1800),
            flash_baud: None,
            host_shell: HostShell::detect(),
            limits: Limits::default(),
        }
    }
}
