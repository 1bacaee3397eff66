//! Debugger attach and core dump retrieval

use std::path::Path;
use serde::Serialize;

use super::serial_flags;
use crate::error::{Result, ToolError};
use crate::parsers::sdkconfig;
use crate::paths::{self, HostShell};

const COREDUMP_ENABLE_PREFIX: &str = "CONFIG_ESP_COREDUMP_ENABLE";

pub fn gdb() -> Vec<String> {
    vec!["gdb".to_string()]
}

/// Where a core dump is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreDumpSource {
    /// Read from the device's flash over serial
    Device { port: Option<String> },
    /// A previously saved core file
    File(String),
}

impl CoreDumpSource {
    pub fn from_args(core_file: Option<&str>, port: Option<&str>) -> Self {
        match core_file.map(str::trim).filter(|s| !s.is_empty()) {
            Some(file) => CoreDumpSource::File(file.to_string()),
            None => CoreDumpSource::Device {
                port: port.map(str::to_string),
            },
        }
    }
}

/// `idf.py coredump-info --core <file>` or `idf.py [-p port] coredump-info`
pub fn coredump_info(source: &CoreDumpSource, project: &Path, shell: HostShell) -> Result<Vec<String>> {
    match source {
        CoreDumpSource::File(file) => {
            let path = if Path::new(file).is_absolute() {
                Path::new(file).to_path_buf()
            } else {
                project.join(file)
            };
            if !path.is_file() {
                return Err(ToolError::validation(
                    "core_file",
                    format!("{} does not exist", path.display()),
                ));
            }
            Ok(vec![
                "coredump-info".to_string(),
                "--core".to_string(),
                paths::normalize_path(&path, shell),
            ])
        }
        CoreDumpSource::Device { port } => {
            let mut args = serial_flags(port.as_deref(), None)?;
            args.push("coredump-info".to_string());
            Ok(args)
        }
    }
}

/// Any `CONFIG_ESP_COREDUMP_ENABLE*=y` line (to flash or UART)
pub fn coredump_enabled(sdkconfig_text: &str) -> bool {
    sdkconfig::parse(sdkconfig_text)
        .iter()
        .any(|(k, v)| k.starts_with(COREDUMP_ENABLE_PREFIX) && v == "y")
}

#[derive(Debug, Serialize)]
pub struct CoreDumpInstructions {
    pub coredump_enabled: bool,
    pub message: String,
    pub steps: Vec<String>,
}

pub fn enable_instructions() -> CoreDumpInstructions {
    CoreDumpInstructions {
        coredump_enabled: false,
        message: "Core dumps are not enabled for this project".to_string(),
        steps: vec![
            "Run menuconfig: Component config -> ESP System Settings -> Core dump".to_string(),
            "Select 'Flash' as the core dump destination (CONFIG_ESP_COREDUMP_ENABLE_TO_FLASH=y)".to_string(),
            "Make sure the partition table has a 'coredump' data partition".to_string(),
            "Rebuild and flash, then reproduce the crash".to_string(),
        ],
    }
}
