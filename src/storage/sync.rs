use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{OnceCell, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{
    models::task::Task,
    services::history::History,
    storage::{
        HISTORY_KEY, KeyValueStore, TASKS_KEY,
        migrations::{normalize_history, normalize_tasks},
    },
};

enum WriteOp {
    Set { key: &'static str, value: Value },
    Flush(oneshot::Sender<()>),
}

/// Cheap handle used by the in-memory stores to enqueue full snapshots.
///
/// Enqueueing never blocks and never fails from the caller's point of view.
#[derive(Debug, Clone)]
pub struct WriteThrough {
    sender: mpsc::UnboundedSender<WriteOp>,
}

impl WriteThrough {
    pub fn write<T: Serialize + ?Sized>(&self, key: &'static str, snapshot: &T) {
        let value = match serde_json::to_value(snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize snapshot, dropping write");
                return;
            }
        };
        if self.sender.send(WriteOp::Set { key, value }).is_err() {
            warn!(key, "Writer is gone, dropping write");
        }
    }

    /// A handle whose writes go nowhere.
    #[cfg(test)]
    pub fn detached() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { sender }
    }
}

impl std::fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::Set { key, .. } => write!(f, "Set({key})"),
            WriteOp::Flush(_) => f.write_str("Flush"),
        }
    }
}

/// Collections read at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hydrated {
    pub tasks: Vec<Task>,
    pub history: History,
}

/// Owns the boundary between the in-memory collections and the durable store.
///
/// Reads happen once, at hydration. Writes are queued and issued in order by a
/// single background task; failures are logged and dropped.
pub struct PersistenceSync {
    store: Arc<dyn KeyValueStore>,
    writer: WriteThrough,
    hydrated: OnceCell<Hydrated>,
}

impl PersistenceSync {
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store.clone(), receiver));
        Self {
            store,
            writer: WriteThrough { sender },
            hydrated: OnceCell::new(),
        }
    }

    pub fn writer(&self) -> WriteThrough {
        self.writer.clone()
    }

    /// Loads tasks and history. Concurrent callers share one load, so the
    /// create-default path runs at most once.
    pub async fn hydrate(&self) -> Hydrated {
        self.hydrated
            .get_or_init(|| async {
                let tasks: Vec<Task> = self.load_or_default(TASKS_KEY, normalize_tasks).await;
                let history: History = self.load_or_default(HISTORY_KEY, normalize_history).await;
                info!(tasks = tasks.len(), days = history.len(), "Hydrated from storage");
                Hydrated { tasks, history }
            })
            .await
            .clone()
    }

    /// Waits until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writer.sender.send(WriteOp::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    async fn load_or_default<T>(&self, key: &'static str, migrate: fn(Value) -> Value) -> T
    where
        T: DeserializeOwned + Serialize + Default,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_value(migrate(raw)) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key, error = %e, "Stored value is malformed, using default");
                    T::default()
                }
            },
            Ok(None) => {
                debug!(key, "Nothing stored yet, writing default");
                let default = T::default();
                match serde_json::to_value(&default) {
                    Ok(value) => {
                        if let Err(e) = self.store.set(key, value).await {
                            warn!(key, error = %e, "Failed to write default");
                        }
                    }
                    Err(e) => warn!(key, error = %e, "Failed to serialize default"),
                }
                default
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read from storage, using default");
                T::default()
            }
        }
    }
}

async fn run_writer(store: Arc<dyn KeyValueStore>, mut receiver: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = receiver.recv().await {
        match op {
            WriteOp::Set { key, value } => match store.set(key, value).await {
                Ok(()) => debug!(key, "Persisted snapshot"),
                Err(e) => warn!(key, error = %e, "Failed to persist snapshot, keeping in-memory state"),
            },
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
