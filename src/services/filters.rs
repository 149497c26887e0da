use std::{fmt, sync::Arc};

use tracing::debug;

use crate::models::{day::Day, task::Task};

/// Name of the recurrence filter, registered and active by default.
pub const DAY_FILTER: &str = "day";

/// Name of the filter hiding tasks already completed on the viewed day.
pub const PENDING_FILTER: &str = "pending";

/// Whether `task` recurs on the weekday of `day`.
pub fn is_scheduled(task: &Task, day: Day) -> bool {
    task.days.contains(&day.weekday())
}

pub type TaskPredicate = Arc<dyn Fn(&Task) -> bool + Send + Sync>;

#[derive(Clone)]
enum Predicate {
    /// Evaluated against the set's bound day at apply time.
    ScheduledOnDay,
    Custom(TaskPredicate),
}

/// Named, independently toggleable task predicates combined with AND.
///
/// The set stores the day it is bound to rather than a predicate closing over
/// it, so a day change can never leave a stale recurrence check behind.
#[derive(Clone)]
pub struct FilterSet {
    day: Day,
    registered: Vec<(String, Predicate)>,
    active: Vec<String>,
}

impl FilterSet {
    /// A set holding only the recurrence filter, active, bound to `day`.
    pub fn for_day(day: Day) -> Self {
        Self {
            day,
            registered: vec![(DAY_FILTER.to_string(), Predicate::ScheduledOnDay)],
            active: vec![DAY_FILTER.to_string()],
        }
    }

    /// Rebinds the recurrence filter to `day`. Which filters are active is
    /// preserved.
    pub fn bind_day(&mut self, day: Day) {
        self.day = day;
    }

    /// Registers `predicate` under `name`, replacing any previous predicate
    /// with that name. Registration does not activate the filter.
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Task) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let predicate = Predicate::Custom(Arc::new(predicate));
        match self.registered.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = predicate,
            None => self.registered.push((name, predicate)),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.iter().any(|(n, _)| n == name)
    }

    pub fn registered_names(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(|(n, _)| n.as_str())
    }

    /// Active filter names in the order they were activated.
    pub fn active_names(&self) -> Vec<String> {
        self.active.clone()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|n| n == name)
    }

    /// Flips `name` in the active set and returns whether it is now active.
    /// Unregistered names are ignored.
    pub fn toggle(&mut self, name: &str) -> bool {
        if !self.is_registered(name) {
            debug!(filter = name, "Ignoring toggle of unregistered filter");
            return false;
        }
        if self.is_active(name) {
            self.active.retain(|n| n != name);
            false
        } else {
            self.active.push(name.to_string());
            true
        }
    }

    /// Replaces the active set wholesale. Unregistered and repeated names are
    /// dropped.
    pub fn set_active<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut active: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if self.is_registered(&name) && !active.contains(&name) {
                active.push(name);
            }
        }
        self.active = active;
    }

    /// Tasks for which every active predicate holds, in their original order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks
            .iter()
            .filter(|task| self.matches(task))
            .cloned()
            .collect()
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.active.iter().all(|name| {
            self.registered
                .iter()
                .find(|(n, _)| n == name)
                .is_none_or(|(_, predicate)| match predicate {
                    Predicate::ScheduledOnDay => is_scheduled(task, self.day),
                    Predicate::Custom(f) => f(task),
                })
        })
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("day", &self.day)
            .field("registered", &self.registered_names().collect::<Vec<_>>())
            .field("active", &self.active)
            .finish()
    }
}
