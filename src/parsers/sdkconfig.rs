//! sdkconfig parsing and comparison

use std::collections::BTreeMap;
use serde::Serialize;

use crate::config::Limits;

/// Parse `KEY=VALUE` lines. Comments and blank lines are skipped, one pair of
/// surrounding double quotes is removed, and a repeated key keeps its last value.
pub fn parse(text: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    values
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    WiFi,
    Bluetooth,
    Performance,
    Memory,
    Debug,
    General,
}

pub fn categorize(key: &str) -> Category {
    let key = key.to_lowercase();
    let has = |word: &str| key.split('_').any(|seg| seg == word);
    if key.contains("wifi") {
        Category::WiFi
    } else if has("ble") || has("bt") || key.contains("bluetooth") || key.contains("nimble") {
        Category::Bluetooth
    } else if has("cpu") || key.contains("freq") {
        Category::Performance
    } else if key.contains("heap") || key.contains("memory") || key.contains("spiram") {
        Category::Memory
    } else if has("log") || key.contains("debug") {
        Category::Debug
    } else {
        Category::General
    }
}

fn recommendation(key: &str, old: &str, new: &str) -> Option<String> {
    match categorize(key) {
        Category::Performance if key.to_lowercase().contains("freq") => {
            let (old, new) = (old.parse::<i64>().ok()?, new.parse::<i64>().ok()?);
            Some(if new > old {
                "Higher CPU frequency improves performance but increases power consumption".to_string()
            } else {
                "Lower CPU frequency saves power but reduces performance".to_string()
            })
        }
        Category::Memory if key.to_lowercase().contains("heap") => {
            Some("Heap configuration change may affect memory available to tasks".to_string())
        }
        Category::Debug if key.to_lowercase().split('_').any(|seg| seg == "log") => {
            Some(if new == "n" || new.is_empty() {
                "Disabling logs saves flash space but makes debugging harder".to_string()
            } else {
                "Enabling logs helps debugging but uses more flash space".to_string()
            })
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigChange {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SdkconfigDiff {
    pub total_keys: usize,
    pub added_count: usize,
    pub removed_count: usize,
    pub changed_count: usize,
    pub added: Vec<ConfigEntry>,
    pub removed: Vec<ConfigEntry>,
    pub changed: Vec<ConfigChange>,
}

/// Keys only on the right are added, only on the left removed. Values are
/// compared as exact strings.
pub fn diff(left: &BTreeMap<String, String>, right: &BTreeMap<String, String>, limits: &Limits) -> SdkconfigDiff {
    let mut out = SdkconfigDiff::default();

    for (key, value) in right {
        match left.get(key) {
            None => out.added.push(ConfigEntry {
                key: key.clone(),
                value: value.clone(),
                category: categorize(key),
            }),
            Some(old) if old != value => out.changed.push(ConfigChange {
                key: key.clone(),
                old_value: old.clone(),
                new_value: value.clone(),
                category: categorize(key),
                recommendation: recommendation(key, old, value),
            }),
            Some(_) => {}
        }
    }
    for (key, value) in left {
        if !right.contains_key(key) {
            out.removed.push(ConfigEntry {
                key: key.clone(),
                value: value.clone(),
                category: categorize(key),
            });
        }
    }

    out.total_keys = left.len() + out.added.len();
    out.added_count = out.added.len();
    out.removed_count = out.removed.len();
    out.changed_count = out.changed.len();
    out.added.truncate(limits.max_added_configs);
    out.removed.truncate(limits.max_removed_configs);
    out.changed.truncate(limits.max_changed_configs);
    out
}

/// Compare two sdkconfig bodies
pub fn compare(left: &str, right: &str, limits: &Limits) -> SdkconfigDiff {
    diff(&parse(left), &parse(right), limits)
}

/// Rewrite the partition table keys so the build uses `csv_name`.
/// Other lines are kept untouched and in order.
pub fn with_custom_partition_table(text: &str, csv_name: &str) -> String {
    const REPLACED: &[&str] = &[
        "CONFIG_PARTITION_TABLE_SINGLE_APP",
        "CONFIG_PARTITION_TABLE_SINGLE_APP_LARGE",
        "CONFIG_PARTITION_TABLE_TWO_OTA",
        "CONFIG_PARTITION_TABLE_TWO_OTA_LARGE",
        "CONFIG_PARTITION_TABLE_CUSTOM",
        "CONFIG_PARTITION_TABLE_CUSTOM_FILENAME",
        "CONFIG_PARTITION_TABLE_FILENAME",
    ];

    let mut out: Vec<String> = text
        .lines()
        .filter(|line| {
            let t = line.trim();
            let key = t
                .strip_prefix("# ")
                .and_then(|rest| rest.strip_suffix(" is not set"))
                .or_else(|| t.split_once('=').map(|(k, _)| k.trim()));
            !key.is_some_and(|k| REPLACED.contains(&k))
        })
        .map(str::to_string)
        .collect();

    out.push("# CONFIG_PARTITION_TABLE_SINGLE_APP is not set".to_string());
    out.push("# CONFIG_PARTITION_TABLE_TWO_OTA is not set".to_string());
    out.push("CONFIG_PARTITION_TABLE_CUSTOM=y".to_string());
    out.push(format!("CONFIG_PARTITION_TABLE_CUSTOM_FILENAME=\"{}\"", csv_name));
    out.push(format!("CONFIG_PARTITION_TABLE_FILENAME=\"{}\"", csv_name));

    let mut text = out.join("\n");
    text.push('\n');
    text
}
