//! Integration tests for the esp-idf-mcp server
//!
//! Tool invocation tests live next to the handler in src/tools/handler.rs.

use std::time::Duration;
use esp_idf_mcp::{Config, EspIdfToolHandler, ToolError};
use esp_idf_mcp::paths::HostShell;

#[test]
fn test_handler_creation() {
    let config = Config::default();
    let handler = EspIdfToolHandler::new(config);
    assert_eq!(handler.config().command_timeout, Duration::from_secs(300));
}

#[test]
fn test_handler_default() {
    let _handler = EspIdfToolHandler::default();
}

#[test]
fn test_config_default_values() {
    let config = Config::default();
    assert!(config.default_port.is_none());
    assert!(config.flash_baud.is_none());
    assert_eq!(config.serial_timeout, Duration::from_secs(10));
    assert_eq!(config.gdb_timeout, Duration::from_secs(600));
    assert_eq!(config.install_timeout, Duration::from_secs(1800));
    assert_eq!(config.limits.max_errors, 20);
    assert_eq!(config.limits.max_contributors, 50);
    assert_eq!(config.limits.default_read_lines, 100);
}

#[test]
fn test_config_from_args() {
    use clap::Parser;
    use esp_idf_mcp::config::Args;

    let args = Args::parse_from([
        "esp-idf-mcp",
        "--idf-path", "/opt/esp-idf",
        "--port", "/dev/ttyUSB0",
        "--command-timeout", "120",
        "--flash-baud", "921600",
        "--max-log-entries", "50",
        "--posix-shell-paths",
    ]);
    let config = Config::from_args(&args);
    assert_eq!(config.idf_path.unwrap().to_str().unwrap(), "/opt/esp-idf");
    assert_eq!(config.default_port.unwrap(), "/dev/ttyUSB0");
    assert_eq!(config.command_timeout, Duration::from_secs(120));
    assert_eq!(config.flash_baud, Some(921600));
    assert_eq!(config.limits.max_log_entries, 50);
    assert_eq!(config.limits.max_crashes, 10);
    assert_eq!(config.host_shell, HostShell::PosixOnWindows);
}

#[test]
fn test_multiple_handlers() {
    let _h1 = EspIdfToolHandler::default();
    let _h2 = EspIdfToolHandler::new(Config {
        idf_path: Some("/opt/esp-idf".into()),
        default_port: Some("/dev/ttyUSB0".into()),
        ..Config::default()
    });
}

#[test]
fn test_tool_error_maps_to_invalid_params() {
    let err: rmcp::ErrorData = ToolError::validation("target", "unsupported").into();
    assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    assert_eq!(err.data.unwrap()["kind"], "validation_error");
}
