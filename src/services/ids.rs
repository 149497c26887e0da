use tracing::warn;
use uuid::Uuid;

use crate::models::task::Task;

pub const TASK_ID_PREFIX: &str = "todo";

/// Hands out `<prefix>_<n>` ids with a strictly increasing `n`.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    index: i64,
}

impl IdGenerator {
    /// The first id handed out is `initial_index + 1`.
    pub fn new(prefix: impl Into<String>, initial_index: i64) -> Self {
        Self {
            prefix: prefix.into(),
            index: initial_index,
        }
    }

    /// Seeds with `tasks.len() - 1` so ids continue after a hydrated
    /// collection. The seed is raised to the highest suffix already in use,
    /// since deletions leave gaps that would otherwise be reissued.
    pub fn seeded_from(prefix: impl Into<String>, tasks: &[Task]) -> Self {
        let prefix = prefix.into();
        let count_seed = tasks.len() as i64 - 1;
        let highest = tasks
            .iter()
            .filter_map(|task| suffix_of(&task.id, &prefix))
            .max();
        let seed = highest.map_or(count_seed, |h| h.max(count_seed));
        Self::new(prefix, seed)
    }

    /// Once the counter is exhausted, ids fall back to a random suffix.
    pub fn next_id(&mut self) -> String {
        match self.index.checked_add(1) {
            Some(next) => {
                self.index = next;
                format!("{}_{}", self.prefix, next)
            }
            None => {
                warn!(prefix = %self.prefix, "Id counter exhausted, using a random suffix");
                format!("{}_{}", self.prefix, Uuid::new_v4().simple())
            }
        }
    }
}

fn suffix_of(id: &str, prefix: &str) -> Option<i64> {
    id.strip_prefix(prefix)?.strip_prefix('_')?.parse().ok()
}
