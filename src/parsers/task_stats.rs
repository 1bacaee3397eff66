//! FreeRTOS `vTaskList` / `vTaskGetRunTimeStats` table parsing

use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

use super::device_log::strip_ansi;

/// `name state prio stack_hwm num [core]`
static TASK_LIST_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\S+)\s+(?P<state>[XRBSD])\s+(?P<prio>\d+)\s+(?P<stack>\d+)\s+(?P<num>\d+)(?:\s+(?P<core>-?\d+|\S+))?$")
        .expect("static regex")
});

/// `name abs_time pct%`, where pct may be `<1`
static RUNTIME_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\S+)\s+(?P<abs>\d+)\s+(?P<pct><?\d+)%$").expect("static regex")
});

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskRow {
    pub name: String,
    pub state: &'static str,
    pub priority: u32,
    /// High-water mark: minimum free stack ever seen
    pub stack_high_water_mark: u32,
    pub task_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RuntimeRow {
    pub name: String,
    pub runtime_ticks: u64,
    /// `None` when the device printed `<1%`
    pub cpu_percent: Option<u32>,
    pub below_one_percent: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskStats {
    pub tasks: Vec<TaskRow>,
    pub runtime: Vec<RuntimeRow>,
    /// Tasks whose stack high-water mark is under 512 bytes/words
    pub low_stack_tasks: Vec<String>,
}

const LOW_STACK_THRESHOLD: u32 = 512;

fn state_name(code: &str) -> &'static str {
    match code {
        "X" => "running",
        "R" => "ready",
        "B" => "blocked",
        "S" => "suspended",
        "D" => "deleted",
        _ => "unknown",
    }
}

pub fn parse(text: &str) -> TaskStats {
    let mut stats = TaskStats::default();

    for raw in text.lines() {
        let cleaned = strip_ansi(raw);
        let line = cleaned.trim();

        if let Some(caps) = TASK_LIST_ROW.captures(line) {
            let (Ok(priority), Ok(stack), Ok(num)) =
                (caps["prio"].parse::<u32>(), caps["stack"].parse::<u32>(), caps["num"].parse::<u32>())
            else {
                continue;
            };
            stats.tasks.push(TaskRow {
                name: caps["name"].to_string(),
                state: state_name(&caps["state"]),
                priority,
                stack_high_water_mark: stack,
                task_number: num,
                core: caps.name("core").map(|m| m.as_str().to_string()),
            });
        } else if let Some(caps) = RUNTIME_ROW.captures(line) {
            let Ok(runtime_ticks) = caps["abs"].parse::<u64>() else {
                continue;
            };
            let pct = &caps["pct"];
            let below_one_percent = pct.starts_with('<');
            stats.runtime.push(RuntimeRow {
                name: caps["name"].to_string(),
                runtime_ticks,
                cpu_percent: if below_one_percent { None } else { pct.parse().ok() },
                below_one_percent,
            });
        }
    }

    stats.low_stack_tasks = stats
        .tasks
        .iter()
        .filter(|t| t.stack_high_water_mark < LOW_STACK_THRESHOLD)
        .map(|t| t.name.clone())
        .collect();
    stats
}
