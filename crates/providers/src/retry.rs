//! Bounded retry with exponential backoff for model calls.
//!
//! Wraps an async operation with `backon::Retryable`. Only errors that
//! [`ProviderError::is_retryable`] accepts are retried; everything else is
//! returned on the first failure.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use deckr_core::error::ProviderError;
use tracing::warn;

/// How many times to attempt a model call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(agent: &deckr_config::AgentConfig) -> Self {
        Self::new(
            agent.retry_max_attempts,
            Duration::from_millis(agent.retry_base_delay_ms),
        )
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry `k` (1-based): `base * 2^(k-1)`.
    pub fn delay_for_attempt(&self, k: u32) -> Duration {
        let exp = k.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.saturating_sub(1);
        ExponentialBuilder::new()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.delay_for_attempt(retries.max(1)))
            .with_factor(2.0)
            .with_max_times(retries as usize)
    }
}

/// A rate-limited call waits at least as long as the provider asked.
///
/// Matches `backon::Retry::adjust`: `None` means the backoff is exhausted.
fn adjust_for_rate_limit(err: &ProviderError, delay: Option<Duration>) -> Option<Duration> {
    match (err, delay) {
        (ProviderError::RateLimited { retry_after_secs }, Some(d)) => {
            Some(d.max(Duration::from_secs(*retry_after_secs)))
        }
        (_, delay) => delay,
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Returns the first success, the first non-retryable error, or the last
/// retryable error once attempts are exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    op.retry(policy.backoff())
        .when(ProviderError::is_retryable)
        .adjust(adjust_for_rate_limit)
        .notify(|err: &ProviderError, delay: Duration| {
            warn!(error = %err, delay_ms = delay.as_millis() as u64, "Model call failed, retrying");
        })
        .await
}
