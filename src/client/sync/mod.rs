//! # Task Synchronization
//!
//! Reliable delivery of task lists to the backend.
//!
//! ## Components
//!
//! - **Queue**: batching, serialized draining and the retry budget
//! - **Sync State**: queue entries and the status snapshot
//! - **Transport**: the HTTP submission endpoint

pub mod queue;
pub mod sync_state;
pub mod transport;

pub use queue::{split_into_batches, TaskSyncQueue};
pub use crate::shared::config::BackoffStrategy;
pub use sync_state::{DrainOutcome, QueuedBatch, SyncFailure, SyncStatus};
pub use transport::{HttpTaskTransport, TaskTransport};
