//! # Task Sync Client
//!
//! Offline-resilient delivery of extracted tasks plus realtime updates.
//!
//! ## Services
//!
//! - **Storage**: key-value persistence behind the cache and shared list
//! - **Offline**: cache, connectivity monitor, shared task list
//! - **Sync**: batched queue draining to the backend
//! - **Realtime**: reconnecting push channel
//! - **Analytics**: buffered telemetry
//!
//! [`TaskClient`] wires one instance of each from injected parts. Every
//! collaborator (storage, clock, transports) is a trait object so tests and
//! embedders can swap them out.

pub mod analytics;
pub mod offline;
pub mod realtime;
pub mod storage;
pub mod sync;

use crate::client::analytics::{AnalyticsSink, AnalyticsTransport, LogTransport};
use crate::client::offline::{CacheStore, Connectivity, ConnectivityMonitor, SharedTaskStore};
use crate::client::realtime::{
    HttpPushTransport, PushScheme, PushTransport, RealtimeChannel, WsPushTransport,
};
use crate::client::storage::{FileStore, KeyValueStore};
use crate::client::sync::{HttpTaskTransport, TaskSyncQueue, TaskTransport};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::config::AppConfig;
use crate::shared::error::SyncError;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Collaborators injected into [`TaskClient::new`]
pub struct ClientParts {
    pub storage: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub task_transport: Arc<dyn TaskTransport>,
    pub push_transport: Arc<dyn PushTransport>,
    pub analytics_transport: Arc<dyn AnalyticsTransport>,
    /// Connectivity reported by the host at startup
    pub initial_connectivity: Connectivity,
}

/// Composition root
pub struct TaskClient {
    config: AppConfig,
    cache: Arc<CacheStore>,
    analytics: Arc<AnalyticsSink>,
    connectivity: Arc<ConnectivityMonitor>,
    queue: Arc<TaskSyncQueue>,
    realtime: RealtimeChannel,
    shared_tasks: Arc<SharedTaskStore>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskClient {
    pub fn new(config: AppConfig, parts: ClientParts) -> Self {
        let cache = Arc::new(CacheStore::new(
            Arc::clone(&parts.storage),
            Arc::clone(&parts.clock),
            &config.cache,
        ));
        let analytics = Arc::new(AnalyticsSink::new(
            config.analytics.clone(),
            parts.analytics_transport,
            Arc::clone(&parts.clock),
        ));
        let connectivity = Arc::new(ConnectivityMonitor::new(
            parts.initial_connectivity,
            Arc::clone(&cache),
            Arc::clone(&analytics),
        ));
        let queue = Arc::new(TaskSyncQueue::new(
            config.sync.clone(),
            parts.task_transport,
            Arc::clone(&cache),
            Arc::clone(&analytics),
            parts.clock,
            connectivity.subscribe(),
        ));
        let realtime = RealtimeChannel::new(config.realtime.clone(), parts.push_transport);
        let shared_tasks = Arc::new(SharedTaskStore::new(
            parts.storage,
            config.cache.shared_tasks_key.clone(),
        ));

        Self {
            config,
            cache,
            analytics,
            connectivity,
            queue,
            realtime,
            shared_tasks,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Production wiring: file storage, network transports, system clock.
    ///
    /// The push transport follows the realtime URL scheme.
    pub fn from_config(config: AppConfig) -> Result<Self, SyncError> {
        config.validate()?;

        let storage = match &config.storage_dir {
            Some(dir) => FileStore::new(dir)?,
            None => FileStore::open_default()?,
        };
        tracing::info!(
            api_url = %config.api_url,
            realtime_url = %config.realtime.url,
            storage_dir = %storage.dir().display(),
            "Task client configured"
        );

        let http = reqwest::Client::new();
        let parts = ClientParts {
            storage: Arc::new(storage),
            clock: Arc::new(SystemClock),
            task_transport: Arc::new(HttpTaskTransport::with_client(http.clone(), config.tasks_url())),
            push_transport: push_transport_for(&config.realtime.url, http)?,
            analytics_transport: Arc::new(LogTransport),
            initial_connectivity: Connectivity::Online,
        };
        Ok(Self::new(config, parts))
    }

    /// Spawn the connectivity watcher and the analytics flush timer.
    ///
    /// Calling it again while running does nothing.
    pub fn start(&self) {
        let mut background = self.lock_background();
        if !background.is_empty() {
            tracing::debug!("Task client already started");
            return;
        }
        background.push(self.queue.spawn_connectivity_watcher());
        background.push(self.analytics.spawn_flush_timer());
        tracing::info!("Task client started");
    }

    /// Stop background work, close the realtime channel and flush analytics
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.lock_background().drain(..).collect();
        for handle in handles {
            handle.abort();
        }
        self.realtime.disconnect();
        let flushed = self.analytics.flush().await;
        tracing::info!(flushed, "Task client shut down");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn analytics(&self) -> &Arc<AnalyticsSink> {
        &self.analytics
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn queue(&self) -> &Arc<TaskSyncQueue> {
        &self.queue
    }

    pub fn realtime(&self) -> &RealtimeChannel {
        &self.realtime
    }

    pub fn shared_tasks(&self) -> &Arc<SharedTaskStore> {
        &self.shared_tasks
    }

    fn lock_background(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.background.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TaskClient {
    fn drop(&mut self) {
        for handle in self.lock_background().drain(..) {
            handle.abort();
        }
    }
}

fn push_transport_for(url: &str, http: reqwest::Client) -> Result<Arc<dyn PushTransport>, SyncError> {
    let transport: Arc<dyn PushTransport> = match PushScheme::from_url(url)? {
        PushScheme::WebSocket => Arc::new(WsPushTransport::new()),
        PushScheme::Http => Arc::new(HttpPushTransport::with_client(http)),
    };
    tracing::debug!(url, "Push transport selected");
    Ok(transport)
}
