//! pytest-embedded runs

use super::{validate_port, validate_target};
use crate::error::{Result, ToolError};
use crate::paths::{self, HostShell};

/// `pytest <test_path> --target <chip> [--port <port>] [extra…]`
pub fn pytest(
    test_path: Option<&str>,
    target: &str,
    port: Option<&str>,
    extra_args: &[String],
    shell: HostShell,
) -> Result<Vec<String>> {
    let chip = validate_target("target", target)?;
    let test_path = test_path.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(".");
    if test_path.starts_with('-') {
        return Err(ToolError::validation("test_path", "test path must not start with '-'"));
    }

    let mut argv = vec![
        "pytest".to_string(),
        paths::normalize(test_path, shell),
        "--target".to_string(),
        chip.to_string(),
    ];
    if let Some(port) = port {
        argv.push("--port".to_string());
        argv.push(validate_port(port)?);
    }
    argv.extend(extra_args.iter().filter(|arg| !arg.is_empty()).cloned());
    Ok(argv)
}
