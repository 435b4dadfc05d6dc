//! Async utilities and patterns
//!
//! Bounded retry with linear backoff for transient failures

use crate::error::TradelinkResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

/// Additional attempts after the first request
pub const MAX_RETRIES: usize = 3;

/// Base delay; retry `k` waits `RETRY_DELAY_MS * k`
pub const RETRY_DELAY_MS: u64 = 1000;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (linear backoff)
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            retry_delay_ms: RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy that gives up after the first failure
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: usize) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(retry as u64))
    }
}

/// Retry an async operation with linear backoff
///
/// The operation receives the zero-based attempt number. Only errors for which
/// [`TradelinkError::is_retryable`] holds are retried; anything else is
/// returned immediately.
pub async fn retry_async<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    operation_name: &str,
) -> TradelinkResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = TradelinkResult<T>>,
{
    let mut attempt = 0;

    loop {
        debug!(
            operation = operation_name,
            attempt = attempt,
            max_retries = policy.max_retries,
            "Attempting operation"
        );

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_retryable() => {
                return Err(err);
            }
            Err(err) => {
                if attempt >= policy.max_retries {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %err,
                        "Operation failed after all retry attempts"
                    );
                    return Err(err);
                }

                attempt += 1;
                let delay = policy.delay_for(attempt);

                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                sleep(delay).await;
            }
        }
    }
}
