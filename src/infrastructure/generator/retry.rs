//! Retry policy for transient generation failures.

use std::time::Duration;

use tracing::warn;

use crate::domain::models::GenerationConfig;

/// Exponential backoff retry policy.
///
/// Only transient failures (timeouts, 429, 5xx) are retried; client errors
/// surface immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff delay before retry `attempt` (0-based), doubling each time
    /// and capped at the configured maximum.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt);
        let delay = self
            .initial_backoff
            .saturating_mul(u32::try_from(multiplier).unwrap_or(u32::MAX));
        delay.min(self.max_backoff)
    }

    /// Sleep out the backoff for `attempt`, logging the wait.
    pub async fn wait(&self, attempt: u32, reason: &str) {
        let delay = self.backoff_for(attempt);
        warn!(
            attempt = attempt + 1,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis() as u64,
            reason,
            "transient generation failure, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
