use tracing::debug;

use crate::{
    models::{
        day::Day,
        task::{NewTask, Task, TaskPatch, TaskRef},
    },
    services::{
        filters::FilterSet,
        ids::{IdGenerator, TASK_ID_PREFIX},
    },
    storage::{TASKS_KEY, sync::WriteThrough},
};

/// Owns the task definitions.
///
/// Every change writes the whole collection through the sink. Operations that
/// resolve to no task change nothing and write nothing.
#[derive(Debug)]
pub struct TaskStore {
    tasks: Vec<Task>,
    ids: IdGenerator,
    sink: WriteThrough,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>, sink: WriteThrough) -> Self {
        let ids = IdGenerator::seeded_from(TASK_ID_PREFIX, &tasks);
        Self { tasks, ids, sink }
    }

    /// Snapshot of every task, in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn add(&mut self, new_task: NewTask) -> Task {
        let task = new_task.into_task(self.ids.next_id());
        debug!(id = %task.id, "Adding task");
        self.tasks.push(task.clone());
        self.write_through();
        task
    }

    /// Flips the task's own completion flag. Day-scoped completion goes
    /// through the history ledger instead.
    pub fn toggle_completion(&mut self, target: impl Into<TaskRef>) -> Option<Task> {
        let index = self.position(&target.into())?;
        let task = &mut self.tasks[index];
        task.is_completed = !task.is_completed;
        let toggled = task.clone();
        self.write_through();
        Some(toggled)
    }

    /// Removes the task. Its completion history is left alone.
    pub fn remove(&mut self, target: impl Into<TaskRef>) -> Option<Task> {
        let index = self.position(&target.into())?;
        let removed = self.tasks.remove(index);
        debug!(id = %removed.id, "Removed task");
        self.write_through();
        Some(removed)
    }

    /// Merges `patch` onto the task with the same id. Unknown ids are ignored
    /// without an error.
    pub fn update(&mut self, patch: TaskPatch) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == patch.id) else {
            debug!(id = %patch.id, "Ignoring update for unknown task");
            return;
        };
        *task = patch.merged_into(task);
        self.write_through();
    }

    /// Tasks that pass `filters` with the recurrence filter bound to `day`.
    pub fn visible_tasks(&self, day: Day, filters: &FilterSet) -> Vec<Task> {
        let mut filters = filters.clone();
        filters.bind_day(day);
        filters.apply(&self.tasks)
    }

    fn position(&self, target: &TaskRef) -> Option<usize> {
        let found = match target {
            TaskRef::Index(index) => (*index < self.tasks.len()).then_some(*index),
            TaskRef::Id(id) => self.tasks.iter().position(|t| t.id == *id),
        };
        if found.is_none() {
            debug!(task = ?target, "No task matches");
        }
        found
    }

    fn write_through(&self) {
        self.sink.write(TASKS_KEY, &self.tasks);
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use jiff::civil::date;
    use serde_json::json;

    use super::*;
    use crate::{
        models::weekday::{Weekday, all_days},
        storage::{KeyValueStore, memory::MemoryStore, sync::PersistenceSync},
    };

    fn monday() -> Day {
        Day::new(date(2018, 12, 24))
    }

    fn store() -> TaskStore {
        TaskStore::new(Vec::new(), WriteThrough::detached())
    }

    #[test]
    fn test_add_assigns_sequential_ids_and_defaults() {
        let mut store = store();
        let first = store.add(NewTask::new("Stretch"));
        let second = store.add(NewTask::new("Gym").on_days([Weekday::MONDAY]));

        assert_eq!(first.id, "todo_0");
        assert_eq!(second.id, "todo_1");
        assert_eq!(first.days, all_days());
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn test_ids_continue_after_hydrated_tasks() {
        let existing = vec![
            NewTask::new("a").into_task("todo_0".to_string()),
            NewTask::new("b").into_task("todo_1".to_string()),
        ];
        let mut store = TaskStore::new(existing, WriteThrough::detached());
        assert_eq!(store.add(NewTask::new("c")).id, "todo_2");
    }

    #[test]
    fn test_toggle_completion_by_index_and_id() {
        let mut store = store();
        store.add(NewTask::new("Floss"));
        store.add(NewTask::new("Read"));

        assert!(store.toggle_completion(0usize).unwrap().is_completed);
        assert!(store.toggle_completion("todo_1").unwrap().is_completed);
        assert!(!store.toggle_completion("todo_1").unwrap().is_completed);
        assert!(store.toggle_completion(5usize).is_none());
        assert!(store.toggle_completion("todo_9").is_none());
    }

    #[test]
    fn test_remove() {
        let mut store = store();
        store.add(NewTask::new("Floss"));
        store.add(NewTask::new("Read"));

        assert_eq!(store.remove("todo_0").unwrap().text, "Floss");
        assert_eq!(store.remove(0usize).unwrap().text, "Read");
        assert!(store.tasks().is_empty());
        assert!(store.remove("todo_0").is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let mut store = store();
        store.add(NewTask::new("Run"));
        store.update(TaskPatch {
            days: Some(BTreeSet::from([Weekday::SATURDAY])),
            ..TaskPatch::new("todo_0")
        });

        let task = store.get("todo_0").unwrap();
        assert_eq!(task.text, "Run");
        assert_eq!(task.days, BTreeSet::from([Weekday::SATURDAY]));
    }

    #[test]
    fn test_update_unknown_id_leaves_snapshot_unchanged() {
        let mut store = store();
        store.add(NewTask::new("Run"));
        store.add(NewTask::new("Swim").on_days([Weekday::FRIDAY]));
        let before = store.tasks();

        store.update(TaskPatch {
            text: Some("Cycle".to_string()),
            ..TaskPatch::new("todo_42")
        });

        assert_eq!(store.tasks(), before);
    }

    #[test]
    fn test_snapshots_do_not_alias() {
        let mut store = store();
        store.add(NewTask::new("Run"));
        let mut snapshot = store.tasks();
        snapshot[0].text = "Changed".to_string();
        assert_eq!(store.get("todo_0").unwrap().text, "Run");
    }

    #[test]
    fn test_added_task_visible_iff_scheduled() {
        for weekday in Weekday::all() {
            let mut store = store();
            let task = store.add(NewTask::new("Only one day").on_days([weekday]));
            let filters = FilterSet::for_day(monday());
            for offset in 0..7 {
                let day = monday().add_days(offset);
                let visible = store.visible_tasks(day, &filters);
                assert_eq!(
                    visible.iter().any(|t| t.id == task.id),
                    day.weekday() == weekday
                );
            }
        }
    }

    #[test]
    fn test_sunday_and_weekday_tasks() {
        let mut store = store();
        store.add(NewTask::new("Plan the week").on_days([Weekday::SUNDAY]));
        store.add(NewTask::new("Commute").on_days((1..=5).map(|d| Weekday::new(d).unwrap())));
        let filters = FilterSet::for_day(monday());
        let texts = |day| {
            store
                .visible_tasks(day, &filters)
                .into_iter()
                .map(|t| t.text)
                .collect::<Vec<_>>()
        };

        assert_eq!(texts(monday().sub_days(1)), vec!["Plan the week"]);
        assert_eq!(texts(monday()), vec!["Commute"]);
    }

    #[tokio::test]
    async fn test_mutations_write_full_collection() {
        let kv = Arc::new(MemoryStore::new());
        let sync = PersistenceSync::new(kv.clone());
        let mut store = TaskStore::new(sync.hydrate().await.tasks, sync.writer());

        store.add(NewTask::new("Run").on_days([Weekday::MONDAY]));
        store.add(NewTask::new("Swim").on_days([Weekday::TUESDAY]));
        store.toggle_completion("todo_1");
        store.remove("todo_0");
        sync.flush().await;

        assert_eq!(
            kv.get(TASKS_KEY).await.unwrap(),
            Some(json!([
                {"id": "todo_1", "text": "Swim", "days": [2], "isCompleted": true}
            ]))
        );
    }
}
