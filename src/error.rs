//! Error types for the esp-idf-mcp server

use rmcp::ErrorData as McpError;
use serde_json::json;
use thiserror::Error;

/// Main error type for the esp-idf-mcp server.
///
/// A toolchain command that exits non-zero is not an error; it is returned
/// as a `CommandResult` and interpreted by the caller.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("ESP-IDF path not configured: {0}")]
    Configuration(String),

    #[error("Invalid ESP-IDF installation: {0}")]
    InvalidToolchain(String),

    #[error("Invalid argument '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Failed to execute {program}: {source}")]
    Execution {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {seconds}s")]
    Timeout {
        seconds: u64,
        stdout: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable identifier reported to the caller alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidToolchain(_) => "invalid_toolchain_error",
            Self::Validation { .. } => "validation_error",
            Self::Execution { .. } => "execution_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let message = err.to_string();
        match &err {
            ToolError::Configuration(_) => {
                McpError::invalid_params(message, Some(json!({ "kind": err.kind() })))
            }
            ToolError::Validation { field, .. } => McpError::invalid_params(
                message,
                Some(json!({ "kind": err.kind(), "field": field })),
            ),
            ToolError::Execution { program, .. } => McpError::internal_error(
                message,
                Some(json!({ "kind": err.kind(), "program": program })),
            ),
            ToolError::Timeout { seconds, stdout, stderr } => McpError::internal_error(
                message,
                Some(json!({
                    "kind": err.kind(),
                    "timeout_seconds": seconds,
                    "stdout": stdout,
                    "stderr": stderr,
                })),
            ),
            _ => McpError::internal_error(message, Some(json!({ "kind": err.kind() }))),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ToolError>;
