use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::weekday::{Weekday, all_days};

/// A recurring to-do definition.
///
/// Field names match the persisted payload (`id`, `text`, `days`,
/// `isCompleted`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Stable identifier, never reused while the store is alive
    pub id: String,
    /// What to do
    pub text: String,
    /// Weekdays the task recurs on. Empty means never scheduled.
    pub days: BTreeSet<Weekday>,
    /// Legacy global completion flag. Day-scoped completion lives in the
    /// history ledger.
    #[serde(default)]
    pub is_completed: bool,
}

/// A task as supplied by a caller, before it has an id.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub text: String,
    pub days: Option<BTreeSet<Weekday>>,
    pub is_completed: Option<bool>,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days = Some(days.into_iter().collect());
        self
    }

    /// Builds the task. This is the only place field defaults are applied:
    /// missing `days` means every day, missing `is_completed` means false.
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            text: self.text,
            days: self.days.unwrap_or_else(all_days),
            is_completed: self.is_completed.unwrap_or(false),
        }
    }
}

/// Partial update for the task with `id`. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub id: String,
    pub text: Option<String>,
    pub days: Option<BTreeSet<Weekday>>,
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn merged_into(&self, task: &Task) -> Task {
        Task {
            id: task.id.clone(),
            text: self.text.clone().unwrap_or_else(|| task.text.clone()),
            days: self.days.clone().unwrap_or_else(|| task.days.clone()),
            is_completed: self.is_completed.unwrap_or(task.is_completed),
        }
    }
}

/// Addresses a task either by its position in the collection or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    Index(usize),
    Id(String),
}

impl From<usize> for TaskRef {
    fn from(index: usize) -> Self {
        TaskRef::Index(index)
    }
}

impl From<&str> for TaskRef {
    fn from(id: &str) -> Self {
        TaskRef::Id(id.to_string())
    }
}

impl From<String> for TaskRef {
    fn from(id: String) -> Self {
        TaskRef::Id(id)
    }
}
