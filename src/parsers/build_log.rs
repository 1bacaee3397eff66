//! Build log classification: compiler, CMake, ninja and linker diagnostics

use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

use crate::config::Limits;

const MAX_INFO: usize = 10;
const MAX_PREAMBLE: usize = 20;

/// `path/file.c:12:5: error: message` (column optional, drive prefix allowed)
static GCC_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>(?:[A-Za-z]:[/\\])?[^\s:][^:]*):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<sev>fatal error|error|warning|note):\s*(?P<msg>.*)$")
        .expect("static regex")
});

/// `CMake Error at main/CMakeLists.txt:3 (idf_component_register):`
static CMAKE_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CMake (?P<sev>Error|Warning)(?: \(dev\))?(?: at (?P<file>(?:[A-Za-z]:[/\\])?[^:]+):(?P<line>\d+))?\s*(?P<msg>.*)$")
        .expect("static regex")
});

/// ninja progress: `[12/1034] Building C object ...`
static NINJA_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+/\d+\]").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Compiler,
    Cmake,
    Linker,
    Ninja,
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub source: Source,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    /// 1-based line in the log where the entry starts
    pub log_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoLine {
    pub log_line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildLogSummary {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub total_lines: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub info: Vec<InfoLine>,
    /// Unclassified lines seen before the first entry
    pub preamble: Vec<String>,
    pub truncated: bool,
    pub suggestions: Vec<String>,
}

enum Line {
    Blank,
    Entry(Diagnostic),
    Info(String),
    /// Compiler notes and anything unrecognized
    Continuation,
}

enum State {
    /// Nothing classified yet
    Preamble,
    InEntry(Diagnostic),
    /// The last entry was an info line
    InInfo,
    /// A blank line closed the last diagnostic; more text still belongs to it
    Closed(Severity),
}

/// Classify a build log. `success` comes only from `exit_code`; text never
/// decides it and an unknown exit status is not success.
pub fn parse(text: &str, exit_code: Option<i32>, limits: &Limits) -> BuildLogSummary {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut info: Vec<InfoLine> = Vec::new();
    let mut preamble = Vec::new();
    let mut state = State::Preamble;
    let mut total_lines = 0;

    for (idx, raw) in text.lines().enumerate() {
        total_lines += 1;
        let line = raw.trim_end();

        state = match (classify(line, idx + 1), state) {
            (Line::Blank, current) => close(current, &mut errors, &mut warnings),
            (Line::Entry(entry), current) => {
                close(current, &mut errors, &mut warnings);
                State::InEntry(entry)
            }
            (Line::Info(message), current) => {
                close(current, &mut errors, &mut warnings);
                info.push(InfoLine { log_line: idx + 1, message });
                State::InInfo
            }
            (Line::Continuation, State::Preamble) => {
                preamble.push(line.trim().to_string());
                State::Preamble
            }
            (Line::Continuation, State::InEntry(mut entry)) => {
                append(&mut entry.message, line);
                State::InEntry(entry)
            }
            (Line::Continuation, State::InInfo) => {
                if let Some(last) = info.last_mut() {
                    append(&mut last.message, line);
                }
                State::InInfo
            }
            (Line::Continuation, State::Closed(severity)) => {
                let target = match severity {
                    Severity::Error => errors.last_mut(),
                    Severity::Warning => warnings.last_mut(),
                };
                if let Some(entry) = target {
                    append(&mut entry.message, line);
                }
                State::Closed(severity)
            }
        };
    }
    close(state, &mut errors, &mut warnings);

    let suggestions = suggestions_for(&errors);
    let (error_count, warning_count, info_count) = (errors.len(), warnings.len(), info.len());
    let truncated = error_count > limits.max_errors
        || warning_count > limits.max_warnings
        || info_count > MAX_INFO
        || preamble.len() > MAX_PREAMBLE;
    errors.truncate(limits.max_errors);
    warnings.truncate(limits.max_warnings);
    info.truncate(MAX_INFO);
    preamble.truncate(MAX_PREAMBLE);

    BuildLogSummary {
        success: exit_code == Some(0),
        exit_code,
        total_lines,
        error_count,
        warning_count,
        info_count,
        errors,
        warnings,
        info,
        preamble,
        truncated,
        suggestions,
    }
}

/// Push an open diagnostic; what follows still attaches to the last entry
fn close(state: State, errors: &mut Vec<Diagnostic>, warnings: &mut Vec<Diagnostic>) -> State {
    match state {
        State::InEntry(entry) => {
            let severity = entry.severity;
            match severity {
                Severity::Error => errors.push(entry),
                Severity::Warning => warnings.push(entry),
            }
            State::Closed(severity)
        }
        other => other,
    }
}

fn append(message: &mut String, line: &str) {
    message.push('\n');
    message.push_str(line.trim());
}

fn classify(line: &str, log_line: usize) -> Line {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }

    if let Some(caps) = GCC_DIAGNOSTIC.captures(trimmed) {
        let severity = match &caps["sev"] {
            "note" => return Line::Continuation,
            "warning" => Severity::Warning,
            _ => Severity::Error,
        };
        let message = &caps["msg"];
        let source = if is_linker_message(message) {
            Source::Linker
        } else {
            Source::Compiler
        };
        return Line::Entry(Diagnostic {
            severity,
            source,
            file: Some(caps["file"].to_string()),
            line: caps["line"].parse().ok(),
            column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
            message: message.to_string(),
            log_line,
        });
    }

    if let Some(caps) = CMAKE_DIAGNOSTIC.captures(trimmed) {
        let severity = if &caps["sev"] == "Error" {
            Severity::Error
        } else {
            Severity::Warning
        };
        return Line::Entry(Diagnostic {
            severity,
            source: Source::Cmake,
            file: caps.name("file").map(|m| m.as_str().to_string()),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            column: None,
            message: trimmed.to_string(),
            log_line,
        });
    }

    if trimmed.starts_with("FAILED:") || trimmed.starts_with("ninja: build stopped") {
        return Line::Entry(entry(Severity::Error, Source::Ninja, trimmed, log_line));
    }

    if is_linker_message(trimmed) {
        return Line::Entry(entry(Severity::Error, Source::Linker, trimmed, log_line));
    }

    if let Some(rest) = trimmed
        .strip_prefix("error:")
        .or_else(|| trimmed.strip_prefix("fatal error:"))
    {
        return Line::Entry(entry(Severity::Error, Source::Other, rest.trim(), log_line));
    }
    if let Some(rest) = trimmed.strip_prefix("warning:") {
        return Line::Entry(entry(Severity::Warning, Source::Other, rest.trim(), log_line));
    }

    if NINJA_PROGRESS.is_match(trimmed)
        || trimmed.contains("Project build complete")
        || trimmed.starts_with("Generating")
        || trimmed.starts_with("Linking")
    {
        return Line::Info(trimmed.to_string());
    }

    Line::Continuation
}

fn entry(severity: Severity, source: Source, message: &str, log_line: usize) -> Diagnostic {
    Diagnostic {
        severity,
        source,
        file: None,
        line: None,
        column: None,
        message: message.to_string(),
        log_line,
    }
}

fn is_linker_message(message: &str) -> bool {
    message.contains("undefined reference") || message.contains("multiple definition")
}

fn suggestions_for(errors: &[Diagnostic]) -> Vec<String> {
    let mut linking = false;
    let mut syntax = false;
    let mut missing_file = false;
    for e in errors {
        let msg = e.message.to_lowercase();
        linking |= e.source == Source::Linker;
        syntax |= msg.contains("syntax error") || msg.contains("expected");
        missing_file |= msg.contains("no such file");
    }

    let mut out = Vec::new();
    if linking {
        out.push("Check for missing source files in CMakeLists.txt".to_string());
        out.push("Ensure all required components are listed in REQUIRES/PRIV_REQUIRES".to_string());
    }
    if syntax {
        out.push("Review syntax errors in source files".to_string());
    }
    if missing_file {
        out.push("Verify include paths and that all referenced files exist".to_string());
    }
    out
}
