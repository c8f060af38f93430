//! Bounded exponential backoff with jitter for remote calls.
//!
//! The delay before retry `k` (1-based) is `base_delay * 2^(k-1)` plus a
//! uniform jitter in `0..=max_jitter`. Only errors that report themselves
//! retryable are retried; anything else is returned at once.

use backon::{BackoffBuilder, Retryable};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::duration_str;

/// Errors that know whether retrying may help.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// How often and how patiently to retry one remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total tries, including the first
    pub max_attempts: u32,

    #[serde(with = "duration_str")]
    pub base_delay: Duration,

    #[serde(with = "duration_str")]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(120),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before the `retry`-th retry (1-based), excluding jitter.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Delay sequence produced by a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct PolicyBackoff {
    policy: RetryPolicy,
    retries: u32,
}

impl Iterator for PolicyBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.retries + 1 >= self.policy.max_attempts {
            return None;
        }
        self.retries += 1;
        Some(self.policy.base_delay_for(self.retries) + self.policy.jitter())
    }
}

impl BackoffBuilder for RetryPolicy {
    type Backoff = PolicyBackoff;

    fn build(self) -> Self::Backoff {
        PolicyBackoff {
            policy: self,
            retries: 0,
        }
    }
}

/// Run `operation` under `policy`, sleeping only the calling task.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &'static str, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + fmt::Display,
{
    operation
        .retry(policy)
        .sleep(tokio::time::sleep)
        .when(|e: &E| e.is_retryable())
        .notify(|e: &E, delay: Duration| {
            tracing::warn!(
                call = label,
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );
        })
        .await
}
