//! Application configuration module
//!
//! Provides the configuration for every service of the sync subsystem.
//! Values come from three layers, later ones overriding earlier ones:
//!
//! 1. Built-in defaults (the values the subsystem was tuned with)
//! 2. An optional TOML file (`AppConfig::load`)
//! 3. Environment variables (`TASKSYNC_API_URL`, `TASKSYNC_REALTIME_URL`,
//!    `TASKSYNC_STORAGE_DIR`)
//!
//! Durations are expressed in milliseconds in TOML (`retry_delay_ms = 1000`).

mod backoff;

pub use backoff::BackoffStrategy;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default REST endpoint of the task backend
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Default push endpoint of the realtime channel
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:8000/ws";

/// Storage key of the offline snapshot
pub const DEFAULT_CACHE_KEY: &str = "task-extractor-cache";

/// Storage key of the shared task list
pub const DEFAULT_SHARED_TASKS_KEY: &str = "tasks";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the task backend (`/tasks` is appended)
    pub api_url: String,
    /// Directory for the file-backed store; platform data dir when unset
    pub storage_dir: Option<PathBuf>,
    /// Sync queue settings
    pub sync: SyncConfig,
    /// Realtime channel settings
    pub realtime: RealtimeConfig,
    /// Offline cache settings
    pub cache: CacheConfig,
    /// Analytics sink settings
    pub analytics: AnalyticsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_dir: None,
            sync: SyncConfig::default(),
            realtime: RealtimeConfig::default(),
            cache: CacheConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

/// Sync queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum submission attempts per batch before the drain aborts
    pub max_retries: u32,
    /// Delay policy between attempts
    pub backoff: BackoffStrategy,
    /// Maximum number of tasks per submitted batch
    pub batch_size: usize,
    /// Deadline for a single submission attempt
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Fixed {
                delay: Duration::from_millis(1000),
            },
            batch_size: 50,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Realtime channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Push endpoint used when `connect` is called without a URL
    pub url: String,
    /// Base reconnect delay, multiplied by the attempt number
    #[serde(rename = "reconnect_delay_ms", with = "duration_ms")]
    pub reconnect_delay: Duration,
    /// Reconnect attempts before the channel gives up
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            reconnect_delay: Duration::from_millis(1000),
            max_reconnect_attempts: 5,
        }
    }
}

/// Offline cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Key holding the offline snapshot
    pub key: String,
    /// Snapshots older than this are discarded on read
    #[serde(rename = "max_age_ms", with = "duration_ms")]
    pub max_age: Duration,
    /// Key holding the shared task list
    pub shared_tasks_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_CACHE_KEY.to_string(),
            max_age: Duration::from_secs(24 * 60 * 60),
            shared_tasks_key: DEFAULT_SHARED_TASKS_KEY.to_string(),
        }
    }
}

/// Analytics sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Buffer size that triggers an immediate flush
    pub max_events: usize,
    /// Hard ceiling on buffered events; the oldest are dropped beyond it
    pub max_buffered_events: usize,
    /// Period of the background flush
    #[serde(rename = "flush_interval_ms", with = "duration_ms")]
    pub flush_interval: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_events: 1000,
            max_buffered_events: 10_000,
            flush_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&raw)?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// URL the sync queue posts batches to
    pub fn tasks_url(&self) -> String {
        format!("{}/tasks", self.api_url.trim_end_matches('/'))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.api_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.api_url, e)))?;
        let realtime = reqwest::Url::parse(&self.realtime.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.realtime.url, e)))?;
        if !matches!(realtime.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                self.realtime.url,
                realtime.scheme()
            )));
        }

        if self.sync.batch_size == 0 {
            return Err(ConfigError::invalid("sync.batch_size", "must be greater than zero"));
        }
        if self.sync.max_retries == 0 {
            return Err(ConfigError::invalid("sync.max_retries", "must be greater than zero"));
        }
        if self.analytics.max_events == 0 {
            return Err(ConfigError::invalid("analytics.max_events", "must be greater than zero"));
        }
        if self.analytics.max_buffered_events < self.analytics.max_events {
            return Err(ConfigError::invalid(
                "analytics.max_buffered_events",
                "must be at least analytics.max_events",
            ));
        }
        if self.cache.key.is_empty() {
            return Err(ConfigError::MissingValue("cache.key"));
        }
        if self.cache.key == self.cache.shared_tasks_key {
            return Err(ConfigError::invalid(
                "cache.shared_tasks_key",
                "must differ from cache.key",
            ));
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("TASKSYNC_API_URL") {
            self.api_url = url;
        }
        if let Ok(url) = std::env::var("TASKSYNC_REALTIME_URL") {
            self.realtime.url = url;
        }
        if let Ok(dir) = std::env::var("TASKSYNC_STORAGE_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the backend URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the realtime push URL
    pub fn realtime_url(mut self, url: impl Into<String>) -> Self {
        self.config.realtime.url = url.into();
        self
    }

    /// Set the file store directory
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    /// Set the number of tasks per batch
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.sync.batch_size = batch_size;
        self
    }

    /// Set the attempts per batch
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.sync.max_retries = max_retries;
        self
    }

    /// Set the delay policy between attempts
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.sync.backoff = backoff;
        self
    }

    /// Set the per-attempt deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.sync.request_timeout = timeout;
        self
    }

    /// Replace the realtime settings
    pub fn realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.config.realtime = realtime;
        self
    }

    /// Replace the cache settings
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Replace the analytics settings
    pub fn analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.config.analytics = analytics;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
