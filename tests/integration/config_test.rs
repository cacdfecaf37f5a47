//! Configuration loading tests

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tasksync::shared::{AppConfig, BackoffStrategy, ConfigError};

fn clear_env() {
    std::env::remove_var("TASKSYNC_API_URL");
    std::env::remove_var("TASKSYNC_REALTIME_URL");
    std::env::remove_var("TASKSYNC_STORAGE_DIR");
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    clear_env();
    std::env::set_var("TASKSYNC_API_URL", "https://tasks.example.com/api/v2");
    std::env::set_var("TASKSYNC_STORAGE_DIR", "/tmp/tasksync-test");

    let config = AppConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.tasks_url(), "https://tasks.example.com/api/v2/tasks");
    assert_eq!(config.realtime.url, "ws://localhost:8000/ws");
    assert_eq!(config.storage_dir.unwrap().to_str(), Some("/tmp/tasksync-test"));
}

#[test]
#[serial]
fn test_invalid_env_url_is_rejected() {
    clear_env();
    std::env::set_var("TASKSYNC_REALTIME_URL", "not a url");

    let result = AppConfig::from_env();
    clear_env();

    assert_matches!(result, Err(ConfigError::InvalidUrl(_)));
}

#[test]
#[serial]
fn test_load_toml_file_then_env() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
api_url = "https://file.example.com/api"

[sync]
batch_size = 10
max_retries = 5
request_timeout_ms = 2500

[sync.backoff]
kind = "exponential"
base_ms = 200
max_ms = 5000

[realtime]
reconnect_delay_ms = 750
"#
    )
    .unwrap();
    std::env::set_var("TASKSYNC_API_URL", "https://env.example.com/api");

    let config = AppConfig::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.api_url, "https://env.example.com/api");
    assert_eq!(config.sync.batch_size, 10);
    assert_eq!(config.sync.max_retries, 5);
    assert_eq!(config.sync.request_timeout, Duration::from_millis(2500));
    assert_eq!(
        config.sync.backoff,
        BackoffStrategy::Exponential {
            base: Duration::from_millis(200),
            max: Duration::from_secs(5),
        }
    );
    assert_eq!(config.realtime.reconnect_delay, Duration::from_millis(750));
    assert_eq!(config.realtime.max_reconnect_attempts, 5);
}

#[test]
#[serial]
fn test_missing_file_is_io_error() {
    clear_env();
    let result = AppConfig::load("/definitely/not/here/tasksync.toml");
    assert_matches!(result, Err(ConfigError::Io(_)));
}
