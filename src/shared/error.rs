//! Shared Error Types
//!
//! This module defines the error types used across the sync subsystem.
//! None of these errors reach the caller of fire-and-forget operations such
//! as `queue_tasks` or `save_tasks_to_cache`; they are absorbed at the edge of
//! the subsystem and turned into log lines and telemetry events.
//!
//! # Error Categories
//!
//! - `SyncError` - failures talking to the remote backend or push endpoint
//! - `StorageError` - failures of the persistent key-value store
//!
//! # Classification
//!
//! `SyncError::kind` buckets an error into an [`ErrorKind`] and
//! `SyncError::user_message` turns it into a short message suitable for a
//! banner or toast.
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread boundaries.
use crate::shared::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the sync subsystem
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote answered with a failure status, or the request never completed
    #[error("Network error: {message}")]
    Network {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Human-readable error message
        message: String,
    },

    /// A single attempt exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The push channel could not be opened or broke mid-stream
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message
        message: String,
    },

    /// Persistent storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of the persistent key-value store
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing the value would exceed the store's capacity
    #[error("storage quota exceeded: {needed} bytes needed, {quota} bytes available")]
    QuotaExceeded {
        /// Bytes the store would hold after the write
        needed: usize,
        /// Configured capacity
        quota: usize,
    },

    /// Underlying I/O failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error buckets used for telemetry and user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend answered but rejected the request
    Api,
    /// Local data failed validation or (de)serialization
    Validation,
    /// The backend requires (different) credentials
    Auth,
    /// The request never got a usable answer
    Network,
    /// Anything else
    Unknown,
}

impl SyncError {
    /// Create a network error without an HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Create a network error carrying the HTTP status that caused it
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Bucket the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network {
                status: Some(401), ..
            } => ErrorKind::Auth,
            Self::Network {
                status: Some(status),
                ..
            } if (400..500).contains(status) => ErrorKind::Api,
            Self::Network { .. } | Self::Timeout(_) | Self::Connection { .. } => {
                ErrorKind::Network
            }
            Self::Serialization(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the failure came from the network layer
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout(_) | Self::Connection { .. }
        )
    }

    /// Whether the backend rejected our credentials
    pub fn is_auth_error(&self) -> bool {
        self.status() == Some(401)
    }

    /// Short message suitable for showing to a user
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { status, .. } => match status {
                Some(401) => "Authentication required".to_string(),
                Some(403) => "Access denied".to_string(),
                Some(404) => "Resource not found".to_string(),
                Some(500) => "Server error occurred".to_string(),
                _ => "Network request failed".to_string(),
            },
            Self::Timeout(_) | Self::Connection { .. } => "Network request failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::network(format!("request timed out: {}", err));
        }
        Self::Network {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
