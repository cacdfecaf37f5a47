//! # Sync State
//!
//! Queue entries and the observable state of the sync queue.
//!
//! ## Features
//!
//! - **Queued Batches**: each batch carries its own attempt counter
//! - **Status Snapshot**: depth, progress counters and the last failure
//! - **Drain Outcome**: why a drain call returned

use crate::shared::task::Task;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One batch waiting in the queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedBatch {
    pub id: Uuid,
    pub tasks: Vec<Task>,
    /// Failed submission attempts in the current drain session
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl QueuedBatch {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tasks,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Record of the most recent aborted drain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncFailure {
    /// Batch at the head of the queue when the drain gave up
    pub batch_id: Uuid,
    pub attempts: u32,
    pub reason: String,
    /// Epoch milliseconds
    pub failed_at: i64,
}

/// Point-in-time view of the queue
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// Batches still waiting for delivery
    pub queue_depth: usize,
    /// Tasks across all waiting batches
    pub pending_tasks: usize,
    /// Batches delivered since the queue was created
    pub synced_batches: u64,
    /// Epoch milliseconds of the last completed drain
    pub last_sync: Option<i64>,
    pub last_failure: Option<SyncFailure>,
}

/// Why a drain call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every queued batch was delivered
    Completed,
    /// Nothing was queued
    Idle,
    /// Another drain is in progress; it will pick up the new batches
    AlreadyRunning,
    /// Connectivity was lost; the queue is intact
    Paused,
    /// The head batch exhausted its attempts; it and later batches stay queued
    Aborted,
}
