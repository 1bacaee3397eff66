//! ESP-IDF serial log segmentation

use std::collections::BTreeMap;
use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

/// `I (1234) wifi: message`; the timestamp may be ticks or `HH:MM:SS.mmm`
static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<level>[EWIDV]) \((?P<ts>[^)]+)\) (?P<tag>[^:\s][^:]*):\s?(?P<msg>.*)$")
        .expect("static regex")
});

static ANSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("static regex"));

const CRASH_MARKERS: &[&str] = &[
    "guru meditation",
    "abort() was called",
    "assert failed",
    "panic'ed",
    "backtrace:",
    "stack overflow",
    "stack canary watchpoint",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Error,
    Warning,
    Info,
    Debug,
    Verbose,
}

impl Level {
    fn from_char(c: &str) -> Option<Self> {
        match c {
            "E" => Some(Level::Error),
            "W" => Some(Level::Warning),
            "I" => Some(Level::Info),
            "D" => Some(Level::Debug),
            "V" => Some(Level::Verbose),
            _ => None,
        }
    }

    /// Accepts `E`, `error`, `WARN`, `warning`, ...
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" | "ERROR" => Some(Level::Error),
            "W" | "WARN" | "WARNING" => Some(Level::Warning),
            "I" | "INFO" => Some(Level::Info),
            "D" | "DEBUG" => Some(Level::Debug),
            "V" | "VERBOSE" => Some(Level::Verbose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceLogEntry {
    pub timestamp: String,
    pub level: Level,
    pub tag: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub continuation: Vec<String>,
    pub is_crash: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DeviceLog {
    pub total_lines: usize,
    pub total_entries: usize,
    pub level_counts: BTreeMap<Level, usize>,
    /// Unmatched lines before the first entry (ROM bootloader output etc.)
    pub preamble: Vec<String>,
    pub entries: Vec<DeviceLogEntry>,
    pub crashes: Vec<DeviceLogEntry>,
    /// Crash markers seen outside any entry (a panic handler prints untagged)
    pub crash_lines: Vec<String>,
    pub recommendations: Vec<String>,
    pub truncated: bool,
}

/// Segment serial output. `filter` keeps entries at that level only; counts
/// always cover every entry.
pub fn parse(text: &str, filter: Option<Level>, max_entries: usize, max_crashes: usize) -> DeviceLog {
    let mut log = DeviceLog::default();
    let mut entries: Vec<DeviceLogEntry> = Vec::new();

    for raw in text.lines() {
        log.total_lines += 1;
        let stripped = strip_ansi(raw);
        let line = stripped.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = ENTRY.captures(line) {
            if let Some(level) = Level::from_char(&caps["level"]) {
                let message = caps["msg"].to_string();
                entries.push(DeviceLogEntry {
                    timestamp: caps["ts"].to_string(),
                    level,
                    tag: caps["tag"].trim().to_string(),
                    is_crash: is_crash(&message),
                    message,
                    continuation: Vec::new(),
                });
                continue;
            }
        }

        match entries.last_mut() {
            Some(last) => {
                if is_crash(line) {
                    last.is_crash = true;
                }
                last.continuation.push(line.to_string());
            }
            None => {
                if is_crash(line) {
                    log.crash_lines.push(line.to_string());
                }
                log.preamble.push(line.to_string());
            }
        }
    }

    for entry in &entries {
        *log.level_counts.entry(entry.level).or_default() += 1;
    }
    log.total_entries = entries.len();

    let crash_count = entries.iter().filter(|e| e.is_crash).count() + log.crash_lines.len();
    let error_count = log.level_counts.get(&Level::Error).copied().unwrap_or(0);
    if crash_count > 0 {
        log.recommendations
            .push(format!("Found {} crash marker(s); decode the backtrace with the project ELF", crash_count));
    }
    if error_count > 0 {
        log.recommendations
            .push(format!("Found {} error entries; review the tags involved", error_count));
    }
    if error_count > 10 {
        log.recommendations
            .push("High error count; look for a repeating failure loop".to_string());
    }

    log.crashes = entries.iter().filter(|e| e.is_crash).take(max_crashes).cloned().collect();

    let mut kept: Vec<DeviceLogEntry> = entries
        .into_iter()
        .filter(|e| filter.is_none_or(|level| e.level == level))
        .collect();
    log.truncated = kept.len() > max_entries;
    kept.truncate(max_entries);
    log.entries = kept;
    log
}

/// Remove ANSI colour sequences emitted by the IDF console
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    ANSI.replace_all(text, "")
}

fn is_crash(line: &str) -> bool {
    let lower = line.to_lowercase();
    CRASH_MARKERS.iter().any(|m| lower.contains(m))
}

/// Free-heap figures printed by the application or by `heap_caps` helpers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HeapSample {
    pub timestamp: Option<String>,
    pub tag: Option<String>,
    pub free_bytes: Option<u64>,
    pub minimum_free_bytes: Option<u64>,
    pub largest_free_block: Option<u64>,
}

static FREE_HEAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:free[ _]?heap(?:[ _]size)?|heap free|free)\s*[:=]?\s*(\d+)").expect("static regex")
});
static MIN_FREE_HEAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)min(?:imum)?[ _]?free(?:[ _]?heap)?(?:[ _]size)?(?:\s+ever)?\s*[:=]?\s*(\d+)").expect("static regex")
});
static LARGEST_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)largest[ _]free[ _]block\s*[:=]?\s*(\d+)").expect("static regex")
});

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}

fn heap_sample(text: &str, timestamp: Option<&str>, tag: Option<&str>) -> Option<HeapSample> {
    let minimum_free_bytes = capture_u64(&MIN_FREE_HEAP, text);
    // strip the minimum figure first so `free` does not pick it up
    let without_min = MIN_FREE_HEAP.replace_all(text, "");
    let free_bytes = capture_u64(&FREE_HEAP, &without_min);
    let largest_free_block = capture_u64(&LARGEST_BLOCK, text);
    if free_bytes.is_none() && minimum_free_bytes.is_none() && largest_free_block.is_none() {
        return None;
    }
    Some(HeapSample {
        timestamp: timestamp.map(str::to_string),
        tag: tag.map(str::to_string),
        free_bytes,
        minimum_free_bytes,
        largest_free_block,
    })
}

/// Extract heap figures from a parsed log and its preamble
pub fn heap_samples(log: &DeviceLog) -> Vec<HeapSample> {
    let mut samples: Vec<HeapSample> = log
        .preamble
        .iter()
        .filter_map(|line| heap_sample(line, None, None))
        .collect();
    for entry in &log.entries {
        if let Some(sample) = heap_sample(&entry.message, Some(&entry.timestamp), Some(&entry.tag)) {
            samples.push(sample);
        }
        samples.extend(
            entry
                .continuation
                .iter()
                .filter_map(|line| heap_sample(line, Some(&entry.timestamp), Some(&entry.tag))),
        );
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOT: &str = "\
ets Jun  8 2016 00:22:57
rst:0x1 (POWERON_RESET),boot:0x13 (SPI_FAST_FLASH_BOOT)
\x1b[0;32mI (29) boot: ESP-IDF v5.2 2nd stage bootloader\x1b[0m
I (312) cpu_start: Starting scheduler.
W (320) wifi:  bad config: ssid empty
    extra detail line
E (400) app: sensor read failed: ESP_ERR_TIMEOUT
I (500) heap: Free heap: 234560, min free heap: 198000
Guru Meditation Error: Core  0 panic'ed (LoadProhibited). Exception was unhandled.
Backtrace: 0x400d1234:0x3ffb1230 0x400d5678:0x3ffb1250
";

    #[test]
    fn test_empty_text() {
        let log = parse("", None, 200, 10);
        assert_eq!(log.total_entries, 0);
        assert!(log.entries.is_empty());
        assert!(log.preamble.is_empty());
    }

    #[test]
    fn test_segments_entries_and_preamble() {
        let log = parse(BOOT, None, 200, 10);
        assert_eq!(log.preamble.len(), 2);
        assert_eq!(log.total_entries, 5);

        let boot = &log.entries[0];
        assert_eq!(boot.level, Level::Info);
        assert_eq!(boot.timestamp, "29");
        assert_eq!(boot.tag, "boot");
        assert_eq!(boot.message, "ESP-IDF v5.2 2nd stage bootloader");

        let wifi = &log.entries[2];
        assert_eq!(wifi.level, Level::Warning);
        assert_eq!(wifi.continuation, vec!["    extra detail line".to_string()]);
        assert!(log.entries.iter().all(|e| !e.tag.is_empty()));
    }

    #[test]
    fn test_crash_attaches_to_previous_entry() {
        let log = parse(BOOT, None, 200, 10);
        let last = log.entries.last().unwrap();
        assert_eq!(last.tag, "heap");
        assert!(last.is_crash);
        assert_eq!(last.continuation.len(), 2);
        assert_eq!(log.crashes.len(), 1);
        assert!(log.recommendations.iter().any(|r| r.contains("crash")));
    }

    #[test]
    fn test_filter_keeps_counts() {
        let log = parse(BOOT, Some(Level::Error), 200, 10);
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].tag, "app");
        assert_eq!(log.level_counts[&Level::Info], 3);
        assert_eq!(log.total_entries, 5);
    }

    #[test]
    fn test_entry_cap() {
        let log = parse(BOOT, None, 2, 10);
        assert_eq!(log.entries.len(), 2);
        assert!(log.truncated);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("warn"), Some(Level::Warning));
        assert_eq!(Level::parse("E"), Some(Level::Error));
        assert_eq!(Level::parse("loud"), None);
    }

    #[test]
    fn test_heap_samples() {
        let log = parse(BOOT, None, 200, 10);
        let samples = heap_samples(&log);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].free_bytes, Some(234560));
        assert_eq!(samples[0].minimum_free_bytes, Some(198000));
        assert_eq!(samples[0].tag.as_deref(), Some("heap"));
    }
}
