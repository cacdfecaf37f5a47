//! TaskSync - Main Library
//!
//! TaskSync is the client-side synchronization layer for extracted task
//! lists: it keeps tasks durable while offline, delivers them to the task
//! backend in batches once a connection is available, and streams
//! server-pushed task updates back to interested views.
//!
//! # Overview
//!
//! - Offline cache with a 24 hour expiry window
//! - Batched, retrying, strictly FIFO delivery to `POST /tasks`
//! - Connectivity monitor that pauses and resumes delivery
//! - Reconnecting realtime channel with per-subscriber fan-out
//! - Buffered analytics with size and timer based flushing
//!
//! # Module Structure
//!
//! - **`shared`** - Transport-agnostic types
//!   - Task record and update events
//!   - Error taxonomy and classification
//!   - Configuration (defaults, environment, TOML)
//!   - Clock abstraction
//!
//! - **`client`** - The services and their composition root
//!   - Storage, offline cache, connectivity, shared task list
//!   - Sync queue and HTTP task transport
//!   - Realtime channel and push transport
//!   - Analytics sink
//!
//! # Usage
//!
//! ```rust,no_run
//! use tasksync::client::TaskClient;
//! use tasksync::shared::{AppConfig, Task};
//!
//! # async fn example() -> Result<(), tasksync::shared::SyncError> {
//! let client = TaskClient::from_config(AppConfig::from_env()?)?;
//! client.start();
//!
//! client
//!     .queue()
//!     .queue_tasks(vec![Task::new("t1", "Write the release notes")])
//!     .await;
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Every service is `Send + Sync` and shared through `Arc`. Background work
//! (connectivity watcher, flush timer, realtime connection) runs on Tokio
//! tasks; none of it blocks the caller.
//!
//! # Error Handling
//!
//! Delivery, caching and telemetry never return errors to the caller; they
//! are logged through `tracing` and surfaced via status snapshots. Fallible
//! setup (configuration, storage) returns `shared::SyncError`.

/// Shared types and data structures
pub mod shared;

/// Sync services and composition root
pub mod client;
