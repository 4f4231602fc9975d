//! Bounded retry for external calls made while healing.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Result, ServiceError, VsmeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(VsmeError::config("retry max_attempts must be at least 1"));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(VsmeError::config(
                "retry initial_backoff must not exceed max_backoff",
            ));
        }
        Ok(())
    }

    /// Delay after failed attempt `attempt` (1-based): doubles, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug)]
pub enum RetryError {
    Cancelled,
    Failed(ServiceError),
}

/// Runs `operation` until it succeeds, fails permanently, or the attempts run
/// out. Cancellation is observed before each attempt and during backoff.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut operation: F,
) -> std::result::Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ServiceError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.transient || attempt >= attempts => {
                return Err(RetryError::Failed(err));
            }
            Err(err) => {
                let delay = policy.backoff(attempt);
                warn!(
                    call = label,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
