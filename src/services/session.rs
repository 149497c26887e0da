use std::sync::Arc;

use crate::{
    models::{
        day::Day,
        task::{NewTask, Task, TaskPatch, TaskRef},
    },
    services::{
        cursor::{Clock, DayCursor},
        filters::{FilterSet, PENDING_FILTER},
        history::HistoryLedger,
        tasks::TaskStore,
    },
    storage::{KeyValueStore, sync::PersistenceSync},
};

/// Top-level context: the single owner of the current day and of every store.
///
/// A session only exists once hydration has completed.
pub struct Session {
    cursor: DayCursor,
    filters: FilterSet,
    tasks: TaskStore,
    history: HistoryLedger,
    sync: PersistenceSync,
}

impl Session {
    pub async fn open(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let sync = PersistenceSync::new(store);
        let hydrated = sync.hydrate().await;
        let cursor = DayCursor::new(clock);
        let mut filters = FilterSet::for_day(cursor.current());
        filters.register(PENDING_FILTER, |_: &Task| true);
        Self {
            filters,
            cursor,
            tasks: TaskStore::new(hydrated.tasks, sync.writer()),
            history: HistoryLedger::new(hydrated.history, sync.writer()),
            sync,
        }
    }

    pub fn day(&self) -> Day {
        self.cursor.current()
    }

    /// Today according to the session clock, independent of the cursor.
    pub fn today(&self) -> Day {
        self.cursor.today()
    }

    pub fn go_to_next_day(&mut self) -> Day {
        let day = self.cursor.go_to_next_day();
        self.filters.bind_day(day);
        day
    }

    pub fn go_to_previous_day(&mut self) -> Day {
        let day = self.cursor.go_to_previous_day();
        self.filters.bind_day(day);
        day
    }

    pub fn go_to_today(&mut self) -> Day {
        let day = self.cursor.go_to_today();
        self.filters.bind_day(day);
        day
    }

    pub fn jump_to(&mut self, day: Day) -> Day {
        let day = self.cursor.jump_to(day);
        self.filters.bind_day(day);
        day
    }

    /// Tasks shown for the current day.
    pub fn visible_tasks(&self) -> Vec<Task> {
        let day = self.cursor.current();
        let mut filters = self.filters.clone();
        let completed = self.history.completions_on(day);
        filters.register(PENDING_FILTER, move |task: &Task| !completed.contains(&task.id));
        self.tasks.visible_tasks(day, &filters)
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn toggle_filter(&mut self, name: &str) -> bool {
        self.filters.toggle(name)
    }

    /// Makes exactly `names` active; unknown names are dropped.
    pub fn set_active_filters<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.set_active(names)
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    pub fn add_task(&mut self, new_task: NewTask) -> Task {
        self.tasks.add(new_task)
    }

    pub fn update_task(&mut self, patch: TaskPatch) {
        self.tasks.update(patch)
    }

    /// Removes the task; its history rows stay unless `purge_history` is set.
    pub fn remove_task(&mut self, target: impl Into<TaskRef>, purge_history: bool) -> Option<Task> {
        let removed = self.tasks.remove(target)?;
        if purge_history {
            self.history.forget_task(&removed.id);
        }
        Some(removed)
    }

    /// Legacy global completion flag.
    pub fn toggle_task(&mut self, target: impl Into<TaskRef>) -> Option<Task> {
        self.tasks.toggle_completion(target)
    }

    /// Toggles completion of `task_id` on the current day.
    pub fn toggle_completion(&mut self, task_id: &str) -> Option<bool> {
        self.history.toggle_completion(task_id, self.cursor.current())
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.history.is_completed_on(task_id, self.cursor.current())
    }

    /// Waits for queued writes; the CLI calls this before exiting.
    pub async fn flush(&self) {
        self.sync.flush().await
    }
}
