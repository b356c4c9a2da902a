//! Uniform retry policy wrapped around every remote call site.
//!
//! Replaces ad hoc per-call pauses: pagination, polling, and single-shot
//! mutations all go through [`RetryPolicy::execute`], so a throttled call
//! is retried the same way everywhere.

use crate::error::{StoreError, StoreResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration for remote identity-store calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = single attempt, no retry).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Cap applied to any computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Zero-delay policy for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether `error` warrants another attempt at this attempt count.
    ///
    /// Concurrent-modification signals are never retried here: the caller
    /// abandons the operation for this pass and relies on the other run.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &StoreError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Delay before the next attempt.
    ///
    /// A throttle response carrying an explicit retry-after wins over the
    /// computed backoff; both are capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &StoreError) -> Duration {
        if let StoreError::Throttled {
            retry_after_secs: Some(secs),
        } = error
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(self.max_delay)
    }

    /// Run `f` until it succeeds, fails non-retryably, or retries exhaust.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts = attempt + 1, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if self.should_retry(attempt, &error) => {
                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_retryable() {
                        warn!(operation, attempts = attempt + 1, error = %error, "retries exhausted");
                        return Err(StoreError::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            message: format!(
                                "{operation} failed after {} attempt(s): {error}",
                                attempt + 1
                            ),
                        });
                    }
                    return Err(error);
                }
            }
        }
    }
}
