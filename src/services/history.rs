use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::{
    models::day::Day,
    storage::{HISTORY_KEY, sync::WriteThrough},
};

/// Date key (`YYYY-MM-DD`) to the ids of the tasks completed on that date.
pub type History = BTreeMap<String, BTreeSet<String>>;

/// Per-day completion record, independent of the task definitions.
///
/// A (date, task) pair that is not recorded is simply not completed. Removing
/// or editing a task never touches the ledger, so rows for deleted tasks stay
/// until [`HistoryLedger::forget_task`] is called explicitly.
#[derive(Debug)]
pub struct HistoryLedger {
    entries: History,
    sink: WriteThrough,
}

impl HistoryLedger {
    pub fn new(entries: History, sink: WriteThrough) -> Self {
        Self { entries, sink }
    }

    pub fn is_completed_on(&self, task_id: &str, day: Day) -> bool {
        day.date_key()
            .and_then(|key| self.entries.get(&key))
            .is_some_and(|ids| ids.contains(task_id))
    }

    /// Flips the completion of `task_id` on `day` and returns the new state.
    ///
    /// Returns `None` and changes nothing when `day` has no date key.
    pub fn toggle_completion(&mut self, task_id: &str, day: Day) -> Option<bool> {
        let Some(key) = day.date_key() else {
            warn!(task_id, day = ?day.date(), "Day has no date key, ignoring toggle");
            return None;
        };

        let ids = self.entries.entry(key).or_default();
        let completed = if ids.remove(task_id) {
            false
        } else {
            ids.insert(task_id.to_string());
            true
        };

        debug!(task_id, %day, completed, "Toggled completion");
        self.write_through();
        Some(completed)
    }

    pub fn completions_on(&self, day: Day) -> BTreeSet<String> {
        day.date_key()
            .and_then(|key| self.entries.get(&key).cloned())
            .unwrap_or_default()
    }

    /// Date keys on which `task_id` was completed, oldest first.
    pub fn completed_dates(&self, task_id: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, ids)| ids.contains(task_id))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Drops every row for `task_id` and returns how many dates were touched.
    pub fn forget_task(&mut self, task_id: &str) -> usize {
        let touched = self
            .entries
            .values_mut()
            .map(|ids| ids.remove(task_id))
            .filter(|removed| *removed)
            .count();
        if touched > 0 {
            debug!(task_id, touched, "Purged task history");
            self.write_through();
        }
        touched
    }

    pub fn snapshot(&self) -> History {
        self.entries.clone()
    }

    fn write_through(&self) {
        self.sink.write(HISTORY_KEY, &self.entries);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::civil::{Date, date};
    use serde_json::json;

    use super::*;
    use crate::storage::{KeyValueStore, memory::MemoryStore, sync::PersistenceSync};

    fn monday() -> Day {
        Day::new(date(2018, 12, 24))
    }

    fn tuesday() -> Day {
        monday().add_days(1)
    }

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(History::new(), WriteThrough::detached())
    }

    #[test]
    fn test_absent_is_not_completed() {
        let ledger = ledger();
        assert!(!ledger.is_completed_on("todo_0", monday()));
        assert!(ledger.completions_on(monday()).is_empty());
    }

    #[test]
    fn test_toggle_is_scoped_to_one_day() {
        let mut ledger = ledger();
        assert_eq!(ledger.toggle_completion("todo_0", monday()), Some(true));
        assert!(ledger.is_completed_on("todo_0", monday()));
        assert!(!ledger.is_completed_on("todo_0", tuesday()));
        assert!(!ledger.is_completed_on("todo_1", monday()));
    }

    #[test]
    fn test_toggle_twice_restores_previous_state() {
        let mut ledger = ledger();
        for day in [monday(), tuesday()] {
            let before = ledger.is_completed_on("todo_3", day);
            ledger.toggle_completion("todo_3", day);
            ledger.toggle_completion("todo_3", day);
            assert_eq!(ledger.is_completed_on("todo_3", day), before);
        }

        ledger.toggle_completion("todo_3", monday());
        ledger.toggle_completion("todo_3", tuesday());
        ledger.toggle_completion("todo_3", tuesday());
        assert!(ledger.is_completed_on("todo_3", monday()));
    }

    #[test]
    fn test_toggle_without_date_key_is_a_no_op() {
        let mut ledger = ledger();
        let ancient = Day::new(Date::MIN);
        assert_eq!(ledger.toggle_completion("todo_0", ancient), None);
        assert!(!ledger.is_completed_on("todo_0", ancient));
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn test_completions_on_and_completed_dates() {
        let mut ledger = ledger();
        ledger.toggle_completion("todo_0", tuesday());
        ledger.toggle_completion("todo_0", monday());
        ledger.toggle_completion("todo_1", monday());

        assert_eq!(
            ledger.completions_on(monday()),
            BTreeSet::from(["todo_0".to_string(), "todo_1".to_string()])
        );
        assert_eq!(
            ledger.completed_dates("todo_0"),
            vec!["2018-12-24".to_string(), "2018-12-25".to_string()]
        );
    }

    #[test]
    fn test_forget_task_removes_all_rows() {
        let mut ledger = ledger();
        ledger.toggle_completion("todo_0", monday());
        ledger.toggle_completion("todo_0", tuesday());
        ledger.toggle_completion("todo_1", tuesday());

        assert_eq!(ledger.forget_task("todo_0"), 2);
        assert!(ledger.completed_dates("todo_0").is_empty());
        assert!(ledger.is_completed_on("todo_1", tuesday()));
        assert_eq!(ledger.forget_task("todo_0"), 0);
    }

    #[tokio::test]
    async fn test_toggle_writes_full_ledger() {
        let store = Arc::new(MemoryStore::new());
        let sync = PersistenceSync::new(store.clone());
        let mut ledger = HistoryLedger::new(sync.hydrate().await.history, sync.writer());

        ledger.toggle_completion("todo_0", monday());
        ledger.toggle_completion("todo_1", tuesday());
        ledger.toggle_completion("todo_0", monday());
        sync.flush().await;

        assert_eq!(
            store.get(HISTORY_KEY).await.unwrap(),
            Some(json!({"2018-12-24": [], "2018-12-25": ["todo_1"]}))
        );
    }
}
