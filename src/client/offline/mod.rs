//! # Offline Support
//!
//! Keeps the application usable without a network:
//!
//! - **Cache**: time-limited snapshot of the last submitted task list
//! - **Connectivity**: online/offline state plus the snapshot loaded on the
//!   last offline transition
//! - **Shared Tasks**: the authoritative task list observed by every surface

pub mod cache;
pub mod connectivity;
pub mod shared_tasks;

pub use cache::{CacheStore, CachedSnapshot};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use shared_tasks::SharedTaskStore;
