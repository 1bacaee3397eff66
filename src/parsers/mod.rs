//! Pure parsers turning toolchain text into structured records.
//!
//! None of these fail: malformed or empty input degrades to a partial or
//! empty record.

pub mod build_log;
pub mod dependencies;
pub mod device_log;
pub mod memory_map;
pub mod sdkconfig;
pub mod task_stats;

/// Parse a `0x`-prefixed hexadecimal number
pub(crate) fn parse_hex(s: &str) -> Option<u64> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}
