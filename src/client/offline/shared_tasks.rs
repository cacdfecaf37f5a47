//! # Shared Task Store
//!
//! Single authoritative copy of the full task list, observed by every
//! surface that needs it. Each mutation is persisted under its own storage
//! key (separate from the offline snapshot) and broadcast to subscribers
//! through a `tokio::sync::watch` channel.
//!
//! Persistence is best-effort: a failed write is logged and the in-memory
//! list still changes, so observers never diverge from each other.

use crate::client::storage::KeyValueStore;
use crate::shared::task::Task;
use std::sync::Arc;
use tokio::sync::watch;

pub struct SharedTaskStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    tasks: watch::Sender<Vec<Task>>,
}

impl SharedTaskStore {
    /// Load the persisted list, starting empty when it is missing or unreadable
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let initial = Self::load(storage.as_ref(), &key);
        let (tasks, _) = watch::channel(initial);
        Self { storage, key, tasks }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    /// Receiver notified after every mutation
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks.subscribe()
    }

    /// Replace the whole list
    pub fn update_tasks(&self, new_tasks: Vec<Task>) {
        self.tasks.send_modify(|tasks| {
            *tasks = new_tasks;
            self.persist(tasks);
        });
    }

    /// Append a task
    pub fn add_task(&self, task: Task) {
        self.tasks.send_modify(|tasks| {
            tasks.push(task);
            self.persist(tasks);
        });
    }

    /// Replace the task with the same id; returns false when no such task exists
    pub fn update_task(&self, updated: Task) -> bool {
        self.tasks.send_if_modified(|tasks| {
            match tasks.iter_mut().find(|t| t.id == updated.id) {
                Some(slot) => {
                    *slot = updated;
                    self.persist(tasks);
                    true
                }
                None => false,
            }
        })
    }

    fn persist(&self, tasks: &[Task]) {
        let result = serde_json::to_string(tasks)
            .map_err(crate::shared::error::SyncError::from)
            .and_then(|raw| self.storage.set(&self.key, &raw).map_err(Into::into));
        if let Err(e) = result {
            tracing::error!(error = %e, key = %self.key, "Failed to persist shared tasks");
        }
    }

    fn load(storage: &dyn KeyValueStore, key: &str) -> Vec<Task> {
        let raw = match storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load shared tasks");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to parse shared tasks");
            Vec::new()
        })
    }
}
