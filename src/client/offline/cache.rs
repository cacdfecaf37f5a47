//! # Offline Task Cache
//!
//! Best-effort storage of the most recent task snapshot under a single key,
//! with time-based expiry.
//!
//! ## Behaviour
//!
//! - **Save**: overwrites the snapshot with `{tasks, timestamp: now}`
//! - **Read**: returns `None` when the snapshot is absent, unreadable, or
//!   older than the configured maximum age; an expired snapshot is deleted
//!   as part of the read
//! - **Clear**: deletes the snapshot
//!
//! No operation ever returns an error to its caller. Failures (quota, I/O,
//! corrupt JSON) are logged and degrade to "no cache available".

use crate::client::storage::KeyValueStore;
use crate::shared::clock::Clock;
use crate::shared::config::CacheConfig;
use crate::shared::error::SyncError;
use crate::shared::task::Task;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Stored representation of a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedSnapshot {
    /// The full task list at save time
    pub tasks: Vec<Task>,
    /// Epoch milliseconds at save time
    pub timestamp: i64,
}

/// Snapshot cache over a key-value store
pub struct CacheStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
    max_age: Duration,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        Self {
            storage,
            clock,
            key: config.key.clone(),
            max_age: config.max_age,
        }
    }

    /// Overwrite the snapshot with `tasks`
    pub fn save_tasks_to_cache(&self, tasks: &[Task]) {
        match self.try_save(tasks) {
            Ok(()) => tracing::info!(count = tasks.len(), "Tasks saved to cache"),
            Err(e) => tracing::error!(error = %e, "Failed to save tasks to cache"),
        }
    }

    /// The cached tasks, if a fresh snapshot exists
    pub fn get_cached_tasks(&self) -> Option<Vec<Task>> {
        match self.try_read() {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!(error = %e, "Failed to retrieve tasks from cache");
                None
            }
        }
    }

    /// Delete the snapshot
    pub fn clear_cache(&self) {
        match self.storage.remove(&self.key) {
            Ok(()) => tracing::info!("Cache cleared"),
            Err(e) => tracing::error!(error = %e, "Failed to clear cache"),
        }
    }

    fn try_save(&self, tasks: &[Task]) -> Result<(), SyncError> {
        let snapshot = CachedSnapshot {
            tasks: tasks.to_vec(),
            timestamp: self.clock.now_ms(),
        };
        let raw = serde_json::to_string(&snapshot)?;
        self.storage.set(&self.key, &raw)?;
        Ok(())
    }

    fn try_read(&self) -> Result<Option<Vec<Task>>, SyncError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        let snapshot: CachedSnapshot = serde_json::from_str(&raw)?;

        let age_ms = self.clock.now_ms() - snapshot.timestamp;
        if age_ms > self.max_age.as_millis() as i64 {
            tracing::info!(age_ms, "Cached snapshot expired, discarding");
            self.storage.remove(&self.key)?;
            return Ok(None);
        }

        Ok(Some(snapshot.tasks))
    }
}
