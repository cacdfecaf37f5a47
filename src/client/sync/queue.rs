//! # Task Sync Queue
//!
//! Delivers locally produced task lists to the backend in fixed-size
//! batches, one request at a time, surviving transient failures.
//!
//! ## Lifecycle
//!
//! - `queue_tasks` splits the list into batches, appends them, writes the
//!   full list to the offline cache and, when online and idle, drains
//! - A drain submits the head batch, pops it on success and continues in
//!   FIFO order until the queue is empty
//! - A failed attempt counts against the head batch's own budget; once it
//!   reaches `max_retries` the drain aborts and every remaining batch stays
//!   queued for the next trigger
//! - Losing connectivity pauses the drain before the next submission; the
//!   attempt already in flight finishes (or fails) on its own
//! - Regaining connectivity resets every batch's budget and drains again
//!
//! At most one drain runs per queue. The `is_syncing` flag is held by a
//! guard, so a dropped drain future still releases it. After releasing it
//! the drain looks at the queue once more; a caller that appended while the
//! flag was still set relies on that second look.
//!
//! Nothing here returns an error to the caller: failures end up in the log,
//! the analytics sink and `SyncStatus::last_failure`.

use crate::client::analytics::{AnalyticsEvent, AnalyticsSink, EventMetadata};
use crate::client::offline::cache::CacheStore;
use crate::client::offline::connectivity::Connectivity;
use crate::client::sync::sync_state::{DrainOutcome, QueuedBatch, SyncFailure, SyncStatus};
use crate::client::sync::transport::TaskTransport;
use crate::shared::clock::Clock;
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use crate::shared::task::Task;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Split `tasks` into consecutive slices of at most `batch_size` tasks
pub fn split_into_batches(tasks: &[Task], batch_size: usize) -> Vec<Vec<Task>> {
    tasks
        .chunks(batch_size.max(1))
        .map(<[Task]>::to_vec)
        .collect()
}

#[derive(Debug, Default)]
struct QueueState {
    batches: VecDeque<QueuedBatch>,
    synced_batches: u64,
    last_sync: Option<i64>,
    last_failure: Option<SyncFailure>,
}

/// Batched, serialized delivery of tasks to the backend
pub struct TaskSyncQueue {
    config: SyncConfig,
    transport: Arc<dyn TaskTransport>,
    cache: Arc<CacheStore>,
    analytics: Arc<AnalyticsSink>,
    clock: Arc<dyn Clock>,
    connectivity: watch::Receiver<Connectivity>,
    state: Mutex<QueueState>,
    is_syncing: AtomicBool,
    drains_started: AtomicU64,
}

impl TaskSyncQueue {
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn TaskTransport>,
        cache: Arc<CacheStore>,
        analytics: Arc<AnalyticsSink>,
        clock: Arc<dyn Clock>,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Self {
        Self {
            config,
            transport,
            cache,
            analytics,
            clock,
            connectivity,
            state: Mutex::new(QueueState::default()),
            is_syncing: AtomicBool::new(false),
            drains_started: AtomicU64::new(0),
        }
    }

    /// Enqueue `tasks` and start draining when possible
    pub async fn queue_tasks(&self, tasks: Vec<Task>) {
        let batches = split_into_batches(&tasks, self.config.batch_size);
        let queue_length = {
            let mut state = self.state.lock().await;
            state.batches.extend(batches.into_iter().map(QueuedBatch::new));
            state.batches.len()
        };

        self.cache.save_tasks_to_cache(&tasks);
        self.analytics
            .track_event(
                AnalyticsEvent::TaskQueued,
                EventMetadata::task_count(tasks.len()).with_queue_length(queue_length),
            )
            .await;

        if self.is_online() && !self.is_syncing() {
            self.sync_tasks().await;
        }
    }

    /// Drain the queue unless a drain is already running
    pub async fn sync_tasks(&self) -> DrainOutcome {
        let mut previous = None;
        loop {
            let Some(guard) = SyncingGuard::acquire(&self.is_syncing) else {
                tracing::debug!("Sync already in progress");
                return previous.unwrap_or(DrainOutcome::AlreadyRunning);
            };
            let outcome = self.drain().await;
            drop(guard);

            // Batches appended after the drain saw an empty queue, or connectivity
            // returning after a pause, were skipped by callers that saw the flag set
            if outcome != DrainOutcome::Aborted
                && self.is_online()
                && self.queue_depth().await > 0
            {
                previous = Some(outcome);
                continue;
            }
            return outcome;
        }
    }

    /// Connectivity restored: fresh budgets, then drain
    pub async fn handle_online(&self) -> DrainOutcome {
        tracing::info!("Connection restored, starting sync");
        self.reset_attempts().await;
        self.sync_tasks().await
    }

    /// Connectivity lost: the running drain pauses before its next submission
    pub fn handle_offline(&self) {
        tracing::info!(syncing = self.is_syncing(), "Connection lost, pausing sync");
    }

    /// React to connectivity transitions until the handle is aborted
    pub fn spawn_connectivity_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        let mut connectivity = self.connectivity.clone();
        tokio::spawn(async move {
            while connectivity.changed().await.is_ok() {
                let current = *connectivity.borrow_and_update();
                match current {
                    Connectivity::Online => {
                        queue.handle_online().await;
                    }
                    Connectivity::Offline => queue.handle_offline(),
                }
            }
        })
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::Acquire)
    }

    /// Number of drain sessions that actually submitted something
    pub fn drains_started(&self) -> u64 {
        self.drains_started.load(Ordering::Relaxed)
    }

    pub async fn queue_depth(&self) -> usize {
        self.state.lock().await.batches.len()
    }

    pub async fn last_failure(&self) -> Option<SyncFailure> {
        self.state.lock().await.last_failure.clone()
    }

    /// Waiting batches, head first
    pub async fn queued_batches(&self) -> Vec<QueuedBatch> {
        self.state.lock().await.batches.iter().cloned().collect()
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.lock().await;
        SyncStatus {
            is_syncing: self.is_syncing(),
            queue_depth: state.batches.len(),
            pending_tasks: state.batches.iter().map(|b| b.tasks.len()).sum(),
            synced_batches: state.synced_batches,
            last_sync: state.last_sync,
            last_failure: state.last_failure.clone(),
        }
    }

    fn is_online(&self) -> bool {
        self.connectivity.borrow().is_online()
    }

    async fn drain(&self) -> DrainOutcome {
        let queue_length = {
            let mut state = self.state.lock().await;
            for batch in state.batches.iter_mut() {
                batch.attempts = 0;
            }
            state.batches.len()
        };
        if queue_length == 0 {
            return DrainOutcome::Idle;
        }

        self.drains_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(queue_length, "Starting task sync");

        loop {
            if !self.is_online() {
                tracing::info!("Offline, leaving remaining batches queued");
                return DrainOutcome::Paused;
            }

            let head = self.state.lock().await.batches.front().cloned();
            let Some(batch) = head else {
                break;
            };

            match self.submit(&batch).await {
                Ok(()) => self.complete_batch(&batch).await,
                Err(e) => {
                    let attempts = self.record_attempt_failure(batch.id, &e).await;
                    if attempts >= self.config.max_retries {
                        self.abort(&batch, attempts, &e).await;
                        return DrainOutcome::Aborted;
                    }

                    let delay = self.config.backoff.delay_for(attempts);
                    tracing::warn!(
                        batch_id = %batch.id,
                        attempts,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying sync"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.state.lock().await.last_sync = Some(self.clock.now_ms());
        tracing::info!("Task sync completed");
        DrainOutcome::Completed
    }

    async fn submit(&self, batch: &QueuedBatch) -> Result<(), SyncError> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.transport.submit_batch(&batch.tasks)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }

    async fn complete_batch(&self, batch: &QueuedBatch) {
        let remaining = {
            let mut state = self.state.lock().await;
            if state.batches.front().map(|b| b.id) == Some(batch.id) {
                state.batches.pop_front();
            }
            state.synced_batches += 1;
            state.batches.len()
        };

        tracing::info!(count = batch.tasks.len(), remaining, "Synced tasks batch");
        self.analytics
            .track_event(AnalyticsEvent::TaskSync, EventMetadata::task_count(batch.tasks.len()))
            .await;
    }

    async fn record_attempt_failure(&self, batch_id: Uuid, error: &SyncError) -> u32 {
        let mut state = self.state.lock().await;
        match state.batches.iter_mut().find(|b| b.id == batch_id) {
            Some(batch) => {
                batch.attempts += 1;
                batch.last_error = Some(error.to_string());
                batch.attempts
            }
            None => self.config.max_retries,
        }
    }

    async fn abort(&self, batch: &QueuedBatch, attempts: u32, error: &SyncError) {
        let queue_length = {
            let mut state = self.state.lock().await;
            state.last_failure = Some(SyncFailure {
                batch_id: batch.id,
                attempts,
                reason: error.to_string(),
                failed_at: self.clock.now_ms(),
            });
            state.batches.len()
        };

        tracing::error!(
            batch_id = %batch.id,
            attempts,
            queue_length,
            error = %error,
            "Task sync failed, max retries exceeded"
        );
        self.analytics
            .track_event(
                AnalyticsEvent::Error,
                EventMetadata::error("SYNC_FAILED")
                    .with_retry_count(attempts)
                    .with_queue_length(queue_length),
            )
            .await;
    }

    async fn reset_attempts(&self) {
        let mut state = self.state.lock().await;
        for batch in state.batches.iter_mut() {
            batch.attempts = 0;
        }
    }
}

/// Holds the `is_syncing` flag for the lifetime of one drain
struct SyncingGuard<'a>(&'a AtomicBool);

impl<'a> SyncingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
