//! # Task Update Feed
//!
//! Per-view accumulator on top of [`RealtimeChannel`]: keeps the updates
//! for a caller-chosen set of task ids, in arrival order, and the latest
//! connection status.

use crate::client::realtime::channel::{ConnectionStatus, RealtimeChannel, Subscription};
use crate::shared::task::TaskUpdate;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

/// Updates for a set of watched tasks
#[derive(Debug)]
pub struct TaskUpdateFeed {
    task_ids: Arc<RwLock<HashSet<String>>>,
    updates: Arc<Mutex<Vec<TaskUpdate>>>,
    status: Arc<Mutex<ConnectionStatus>>,
    subscriptions: Vec<Subscription>,
}

impl TaskUpdateFeed {
    /// Subscribe to `channel` for `task_ids` and make sure it is connected
    pub fn watch<I, S>(channel: &RealtimeChannel, task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let task_ids: Arc<RwLock<HashSet<String>>> =
            Arc::new(RwLock::new(task_ids.into_iter().map(Into::into).collect()));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let status = Arc::new(Mutex::new(channel.status()));

        let update_subscription = {
            let task_ids = Arc::clone(&task_ids);
            let updates = Arc::clone(&updates);
            channel.subscribe(move |update: &TaskUpdate| {
                let watched = task_ids
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .contains(&update.task_id);
                if watched {
                    updates
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(update.clone());
                }
            })
        };
        let status_subscription = {
            let status = Arc::clone(&status);
            channel.subscribe_to_status(move |next: &ConnectionStatus| {
                *status.lock().unwrap_or_else(|e| e.into_inner()) = *next;
            })
        };

        channel.connect(None);

        Self {
            task_ids,
            updates,
            status,
            subscriptions: vec![update_subscription, status_subscription],
        }
    }

    /// Replace the watched ids; already collected updates are kept
    pub fn set_task_ids<I, S>(&self, task_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.task_ids.write().unwrap_or_else(|e| e.into_inner()) =
            task_ids.into_iter().map(Into::into).collect();
    }

    /// Collected updates, oldest first
    pub fn updates(&self) -> Vec<TaskUpdate> {
        self.updates.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove and return the collected updates
    pub fn take_updates(&self) -> Vec<TaskUpdate> {
        std::mem::take(&mut *self.updates.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Stop receiving; the channel itself stays connected
    pub fn detach(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}
