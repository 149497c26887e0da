use std::collections::BTreeSet;

use jiff::civil::Date;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::weekday::WEEKDAY_NAMES;

/// Brings a persisted task collection up to the current shape.
///
/// - tasks without `days` (written before schedules existed) run every day
/// - out-of-range or non-integer day entries are dropped
/// - a missing or non-boolean `isCompleted` becomes `false`
/// - numeric ids become strings
///
/// Non-array values are returned untouched so the caller can reject them.
pub fn normalize_tasks(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };

    let tasks = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(task) => Some(Value::Object(normalize_task(task))),
            other => {
                warn!(entry = %other, "Dropping task entry that is not an object");
                None
            }
        })
        .collect();
    Value::Array(tasks)
}

fn normalize_task(mut task: Map<String, Value>) -> Map<String, Value> {
    let days = match task.get("days") {
        Some(Value::Array(days)) => days
            .iter()
            .filter_map(Value::as_u64)
            .filter(|d| (*d as usize) < WEEKDAY_NAMES.len())
            .collect::<BTreeSet<_>>(),
        _ => {
            debug!(task = ?task.get("id"), "Task has no schedule, defaulting to every day");
            (0..WEEKDAY_NAMES.len() as u64).collect()
        }
    };
    task.insert("days".to_string(), Value::from_iter(days));

    if !task.get("isCompleted").is_some_and(Value::is_boolean) {
        task.insert("isCompleted".to_string(), Value::Bool(false));
    }

    if let Some(Value::Number(id)) = task.get("id") {
        let id = id.to_string();
        task.insert("id".to_string(), Value::String(id));
    }

    if !task.get("text").is_some_and(Value::is_string) {
        task.insert("text".to_string(), Value::String(String::new()));
    }

    task
}

/// Rewrites history date keys into `YYYY-MM-DD`.
///
/// Older payloads used `M-D-YYYY` with a zero-based, unpadded month
/// (`11-24-2018` is 24 December 2018). Sets whose keys collide after rewriting
/// are merged. Non-object values are returned untouched.
pub fn normalize_history(value: Value) -> Value {
    let Value::Object(entries) = value else {
        return value;
    };

    let mut normalized: Map<String, Value> = Map::new();
    for (key, ids) in entries {
        let key = legacy_date_key(&key).unwrap_or(key);
        let Value::Array(ids) = ids else {
            warn!(date = %key, "Dropping history entry that is not a list");
            continue;
        };
        let merged = match normalized.remove(&key) {
            Some(Value::Array(mut existing)) => {
                for id in ids {
                    if !existing.contains(&id) {
                        existing.push(id);
                    }
                }
                existing
            }
            _ => ids,
        };
        normalized.insert(key, Value::Array(merged));
    }
    Value::Object(normalized)
}

fn legacy_date_key(key: &str) -> Option<String> {
    let parts: Vec<&str> = key.split('-').collect();
    let [month, day, year] = parts.as_slice() else {
        return None;
    };
    if year.len() != 4 || month.len() > 2 || day.len() > 2 {
        return None;
    }
    let month0: i8 = month.parse().ok()?;
    let day: i8 = day.parse().ok()?;
    let year: i16 = year.parse().ok()?;
    let date = Date::new(year, month0.checked_add(1)?, day).ok()?;
    Some(format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month(),
        date.day()
    ))
}
