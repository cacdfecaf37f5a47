//! Shared Module
//!
//! This module contains the types shared by every service of the sync
//! subsystem: the task record and its update events, the error taxonomy,
//! configuration and the clock abstraction.
//!
//! # Overview
//!
//! These types carry no behaviour of their own beyond (de)serialization,
//! validation and classification, and have no dependency on a running
//! tokio runtime.

/// Task record and realtime update event
pub mod task;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Wall clock abstraction
pub mod clock;

/// Re-export commonly used types for convenience
pub use task::{Task, TaskUpdate, UpdateKind};
pub use error::{ErrorKind, StorageError, SyncError};
pub use config::{AppConfig, AppConfigBuilder, BackoffStrategy, ConfigError};
pub use clock::{Clock, ManualClock, SystemClock};
