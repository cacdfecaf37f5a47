//! # Analytics Sink
//!
//! Buffers telemetry events in memory and flushes them in batches.
//!
//! ## Flushing
//!
//! - **Threshold**: tracking the `max_events`-th buffered event flushes
//!   immediately
//! - **Timer**: `spawn_flush_timer` flushes every `flush_interval` while the
//!   buffer is non-empty
//! - **Explicit**: `flush` can be awaited directly (e.g. on shutdown)
//!
//! Flushes are serialized. A flush sends a snapshot of the buffer and, on
//! success, removes exactly the events it sent; events tracked while the
//! flush was in flight stay buffered for the next one. A failed flush keeps
//! the buffer intact and logs the error.
//!
//! After a failed flush the threshold stops triggering flushes; the timer
//! and explicit calls keep retrying, and the first successful flush re-arms
//! the threshold. The buffer never holds more than `max_buffered_events`:
//! beyond that the oldest events are dropped and the loss is logged.
//!
//! The remote collector is pluggable through [`AnalyticsTransport`]; the
//! default [`LogTransport`] only writes the batch to the log.

use crate::shared::clock::Clock;
use crate::shared::config::AnalyticsConfig;
use crate::shared::error::SyncError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Kind of telemetry event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyticsEvent {
    TaskExtraction,
    TaskSync,
    TaskQueued,
    Error,
    OfflineMode,
    CacheHit,
    CacheMiss,
}

/// Optional context attached to an event
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<usize>,
}

impl EventMetadata {
    pub fn task_count(count: usize) -> Self {
        Self {
            task_count: Some(count),
            ..Self::default()
        }
    }

    pub fn error(error_type: impl Into<String>) -> Self {
        Self {
            error_type: Some(error_type.into()),
            ..Self::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_queue_length(mut self, queue_length: usize) -> Self {
        self.queue_length = Some(queue_length);
        self
    }
}

/// A buffered event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedEvent {
    pub id: Uuid,
    pub event: AnalyticsEvent,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub metadata: EventMetadata,
}

/// Destination of flushed batches
#[async_trait]
pub trait AnalyticsTransport: Send + Sync {
    async fn send_batch(&self, events: &[TrackedEvent]) -> Result<(), SyncError>;
}

/// Transport that writes batches to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl AnalyticsTransport for LogTransport {
    async fn send_batch(&self, events: &[TrackedEvent]) -> Result<(), SyncError> {
        let payload = serde_json::to_string(events)?;
        tracing::info!(event_count = events.len(), events = %payload, "Analytics flush");
        Ok(())
    }
}

/// In-memory telemetry buffer
pub struct AnalyticsSink {
    config: AnalyticsConfig,
    transport: Arc<dyn AnalyticsTransport>,
    clock: Arc<dyn Clock>,
    events: Mutex<Vec<TrackedEvent>>,
    flush_lock: Mutex<()>,
    threshold_suspended: AtomicBool,
}

impl AnalyticsSink {
    pub fn new(
        config: AnalyticsConfig,
        transport: Arc<dyn AnalyticsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            clock,
            events: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
            threshold_suspended: AtomicBool::new(false),
        }
    }

    /// Buffer an event, flushing when the buffer is full
    pub async fn track_event(&self, event: AnalyticsEvent, metadata: EventMetadata) {
        tracing::debug!(?event, ?metadata, "Analytics event tracked");

        let buffered = {
            let mut events = self.events.lock().await;
            events.push(TrackedEvent {
                id: Uuid::new_v4(),
                event,
                timestamp: self.clock.now_ms(),
                metadata,
            });
            let overflow = events.len().saturating_sub(self.config.max_buffered_events);
            if overflow > 0 {
                events.drain(..overflow);
                tracing::error!(
                    dropped = overflow,
                    capacity = self.config.max_buffered_events,
                    "Analytics buffer full, dropped oldest events"
                );
            }
            events.len()
        };

        if buffered >= self.config.max_events && !self.threshold_suspended.load(Ordering::Acquire) {
            self.flush().await;
        }
    }

    /// Send buffered events; returns how many were delivered
    pub async fn flush(&self) -> usize {
        let _flushing = self.flush_lock.lock().await;

        let batch = self.events.lock().await.clone();
        if batch.is_empty() {
            return 0;
        }

        match self.transport.send_batch(&batch).await {
            Ok(()) => {
                self.threshold_suspended.store(false, Ordering::Release);
                // Overflow may have dropped part of the batch while it was in flight
                let sent: HashSet<Uuid> = batch.iter().map(|e| e.id).collect();
                self.events.lock().await.retain(|e| !sent.contains(&e.id));
                batch.len()
            }
            Err(e) => {
                self.threshold_suspended.store(true, Ordering::Release);
                tracing::error!(error = %e, event_count = batch.len(), "Analytics flush failed");
                0
            }
        }
    }

    /// Number of events waiting for a flush
    pub async fn pending_events(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Snapshot of the buffered events, oldest first
    pub async fn buffered_events(&self) -> Vec<TrackedEvent> {
        self.events.lock().await.clone()
    }

    /// Flush periodically until the returned handle is aborted
    pub fn spawn_flush_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let sink = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sink.config.flush_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let flushed = sink.flush().await;
                if flushed > 0 {
                    tracing::debug!(flushed, "Periodic analytics flush");
                }
            }
        })
    }
}
