//! Command builders: validated tool arguments to `idf.py` argument vectors.
//!
//! Builders never spawn processes. Validation happens here so a bad
//! argument is rejected before anything runs.

pub mod build;
pub mod configure;
pub mod debug;
pub mod device;
pub mod project;
pub mod testing;

use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::error::{Result, ToolError};

/// Supported ESP32 targets: (name, arch, description)
pub const ESP_TARGETS: &[(&str, &str, &str)] = &[
    ("esp32", "xtensa", "ESP32 (dual-core Xtensa LX6, WiFi + BLE)"),
    ("esp32s2", "xtensa", "ESP32-S2 (single-core Xtensa LX7, WiFi)"),
    ("esp32s3", "xtensa", "ESP32-S3 (dual-core Xtensa LX7, WiFi + BLE)"),
    ("esp32c2", "riscv", "ESP32-C2 (single-core RISC-V, WiFi + BLE)"),
    ("esp32c3", "riscv", "ESP32-C3 (single-core RISC-V, WiFi + BLE)"),
    ("esp32c5", "riscv", "ESP32-C5 (single-core RISC-V, WiFi 6 + BLE)"),
    ("esp32c6", "riscv", "ESP32-C6 (single-core RISC-V, WiFi 6 + BLE + 802.15.4)"),
    ("esp32c61", "riscv", "ESP32-C61 (single-core RISC-V, WiFi 6 + BLE)"),
    ("esp32h2", "riscv", "ESP32-H2 (single-core RISC-V, BLE + 802.15.4)"),
    ("esp32p4", "riscv", "ESP32-P4 (dual-core RISC-V, high-performance)"),
];

#[derive(Debug, Serialize, Clone)]
pub struct TargetInfo {
    /// Target identifier (e.g., "esp32p4")
    pub name: String,
    /// Architecture (e.g., "riscv", "xtensa")
    pub arch: String,
    pub description: String,
}

pub fn targets() -> Vec<TargetInfo> {
    ESP_TARGETS
        .iter()
        .map(|(name, arch, desc)| TargetInfo {
            name: name.to_string(),
            arch: arch.to_string(),
            description: desc.to_string(),
        })
        .collect()
}

/// Check a chip name against the supported set (case-insensitive)
pub fn validate_target(field: &str, target: &str) -> Result<&'static str> {
    let wanted = target.trim().to_ascii_lowercase();
    ESP_TARGETS
        .iter()
        .map(|(name, _, _)| *name)
        .find(|name| *name == wanted)
        .ok_or_else(|| {
            let known: Vec<&str> = ESP_TARGETS.iter().map(|(n, _, _)| *n).collect();
            ToolError::validation(
                field,
                format!("unsupported target '{}'; expected one of {}", target, known.join(", ")),
            )
        })
}

/// Accept `COMn`, device nodes under `/dev/`, and `rfc2217://` / `socket://` URLs
pub fn validate_port(port: &str) -> Result<String> {
    let port = port.trim();
    let valid = if let Some(num) = port.strip_prefix("COM").or_else(|| port.strip_prefix("com")) {
        !num.is_empty() && num.chars().all(|c| c.is_ascii_digit())
    } else if let Some(rest) = port.strip_prefix("/dev/") {
        !rest.is_empty() && !rest.chars().any(char::is_whitespace)
    } else {
        ["rfc2217://", "socket://"]
            .iter()
            .any(|scheme| port.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
    };

    if valid {
        Ok(port.to_string())
    } else {
        Err(ToolError::validation(
            "port",
            format!(
                "'{}' is not a serial port (expected COMn, /dev/..., rfc2217:// or socket://)",
                port
            ),
        ))
    }
}

/// `-p PORT -b BAUD` global options; both go before the action
pub fn serial_flags(port: Option<&str>, baud: Option<u32>) -> Result<Vec<String>> {
    let mut args = Vec::new();
    if let Some(port) = port {
        args.push("-p".to_string());
        args.push(validate_port(port)?);
    }
    if let Some(baud) = baud {
        if baud == 0 {
            return Err(ToolError::validation("baud", "baud rate must be positive"));
        }
        args.push("-b".to_string());
        args.push(baud.to_string());
    }
    Ok(args)
}

/// A caller-supplied directory that must already exist
pub fn existing_dir(field: &str, path: &str) -> Result<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ToolError::validation(field, "path is required"));
    }
    let dir = PathBuf::from(trimmed);
    if !dir.is_dir() {
        return Err(ToolError::validation(
            field,
            format!("{} does not exist or is not a directory", dir.display()),
        ));
    }
    Ok(dir)
}

/// Read a project's `CONFIG_IDF_TARGET`, if it has an sdkconfig
pub fn configured_target(project: &Path) -> Option<String> {
    let text = std::fs::read_to_string(project.join("sdkconfig")).ok()?;
    crate::parsers::sdkconfig::parse(&text).remove("CONFIG_IDF_TARGET")
}
