//! Build, clean, flash and erase

use std::path::{Path, PathBuf};

use super::serial_flags;
use crate::error::Result;
use crate::paths::{self, HostShell};

/// Split a `;`-separated SDKCONFIG_DEFAULTS list. Order is kept exactly and
/// duplicates are not removed; later files override earlier ones.
pub fn defaults_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(';')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// `idf.py [-DSDKCONFIG_DEFAULTS=a;b] build`
pub fn build(defaults: &[String], shell: HostShell) -> Vec<String> {
    let mut args = Vec::new();
    if !defaults.is_empty() {
        let joined: Vec<String> = defaults.iter().map(|f| paths::normalize(f, shell)).collect();
        args.push(format!("-DSDKCONFIG_DEFAULTS={}", joined.join(";")));
    }
    args.push("build".to_string());
    args
}

pub fn clean(full: bool) -> Vec<String> {
    vec![if full { "fullclean" } else { "clean" }.to_string()]
}

pub fn flash(port: Option<&str>, baud: Option<u32>) -> Result<Vec<String>> {
    let mut args = serial_flags(port, baud)?;
    args.push("flash".to_string());
    Ok(args)
}

pub fn erase_flash(port: Option<&str>, baud: Option<u32>) -> Result<Vec<String>> {
    let mut args = serial_flags(port, baud)?;
    args.push("erase-flash".to_string());
    Ok(args)
}

pub fn flash_and_monitor(port: Option<&str>, baud: Option<u32>) -> Result<Vec<String>> {
    let mut args = serial_flags(port, baud)?;
    args.extend(["flash".to_string(), "monitor".to_string()]);
    Ok(args)
}

/// The build directory, once a build has produced flasher arguments
pub fn artifact_dir(project: &Path) -> Option<PathBuf> {
    let build_dir = project.join("build");
    build_dir.join("flasher_args.json").exists().then_some(build_dir)
}
