//! # Retry Backoff
//!
//! Delay policy applied between submission attempts of the same batch.
//!
//! - **Fixed**: the same delay before every retry (the tuned default, 1 s)
//! - **Exponential**: `base * 2^(attempt - 1)`, capped at `max`

use super::duration_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed interval between retries
    Fixed {
        #[serde(rename = "delay_ms", with = "duration_ms")]
        delay: Duration,
    },
    /// Doubling interval between retries
    Exponential {
        #[serde(rename = "base_ms", with = "duration_ms")]
        base: Duration,
        #[serde(rename = "max_ms", with = "duration_ms")]
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Delay to wait after the `attempt`-th failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed { delay } => *delay,
            BackoffStrategy::Exponential { base, max } => {
                let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                base.checked_mul(factor).unwrap_or(*max).min(*max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Fixed {
            delay: Duration::from_millis(1000),
        }
    }
}
