//! # Connectivity Monitor
//!
//! Bridges the host's online/offline signal into application state.
//!
//! The monitor is observation-only: it never retries anything itself.
//! Transitions are published on a `tokio::sync::watch` channel so the sync
//! queue (and any UI surface) can react, and going offline loads the last
//! cached snapshot so callers have something to fall back on.

use crate::client::analytics::{AnalyticsEvent, AnalyticsSink, EventMetadata};
use crate::client::offline::cache::CacheStore;
use crate::shared::task::Task;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Host connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        matches!(self, Connectivity::Online)
    }
}

/// Tracks connectivity and the offline fallback snapshot
pub struct ConnectivityMonitor {
    status: watch::Sender<Connectivity>,
    cache: Arc<CacheStore>,
    analytics: Arc<AnalyticsSink>,
    cached_tasks: RwLock<Vec<Task>>,
}

impl ConnectivityMonitor {
    /// `initial` is the connectivity reported by the host at startup
    pub fn new(initial: Connectivity, cache: Arc<CacheStore>, analytics: Arc<AnalyticsSink>) -> Self {
        let (status, _) = watch::channel(initial);
        Self {
            status,
            cache,
            analytics,
            cached_tasks: RwLock::new(Vec::new()),
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        *self.status.borrow()
    }

    pub fn is_offline(&self) -> bool {
        !self.connectivity().is_online()
    }

    /// Tasks loaded from the cache on the last offline transition
    pub fn cached_tasks(&self) -> Vec<Task> {
        self.cached_tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Receiver notified on every actual transition
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.status.subscribe()
    }

    /// The host reported that the network is back
    pub async fn handle_online(&self) {
        if self.transition(Connectivity::Online) {
            tracing::info!("Connection restored");
        }
    }

    /// The host reported that the network is gone
    pub async fn handle_offline(&self) {
        if !self.transition(Connectivity::Offline) {
            return;
        }
        tracing::info!("Connection lost, falling back to cached tasks");
        self.analytics
            .track_event(AnalyticsEvent::OfflineMode, EventMetadata::default())
            .await;

        match self.cache.get_cached_tasks() {
            Some(tasks) => {
                tracing::info!(count = tasks.len(), "Loaded tasks from cache");
                let count = tasks.len();
                self.set_cached_tasks(tasks);
                self.analytics
                    .track_event(AnalyticsEvent::CacheHit, EventMetadata::task_count(count))
                    .await;
            }
            None => {
                self.analytics
                    .track_event(AnalyticsEvent::CacheMiss, EventMetadata::default())
                    .await;
            }
        }
    }

    /// Persist `tasks` as the offline snapshot and expose them immediately
    pub fn save_tasks(&self, tasks: Vec<Task>) {
        self.cache.save_tasks_to_cache(&tasks);
        self.set_cached_tasks(tasks);
    }

    fn set_cached_tasks(&self, tasks: Vec<Task>) {
        *self.cached_tasks.write().unwrap_or_else(|e| e.into_inner()) = tasks;
    }

    fn transition(&self, next: Connectivity) -> bool {
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }
}
