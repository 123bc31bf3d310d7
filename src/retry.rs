//! Retry/backoff policy for remote model calls
//!
//! Linear backoff: the delay after failed attempt `n` is `base_delay * n`.
//! Only transient failures are retried; anything else propagates at once
//! as a processing failure.

use crate::error::AnalysisError;
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Optional ceiling on a single attempt; an elapsed attempt is transient.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based). Saturates
    /// instead of overflowing for very large base delays.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.checked_mul(attempt).unwrap_or(Duration::MAX)
    }

    /// Run `call` until it succeeds, fails non-transiently, or the attempt
    /// ceiling is reached. Exhaustion yields `AnalysisUnavailable`.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, call()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(AnalysisError::ServiceUnavailable(format!(
                        "attempt timed out after {:?}",
                        limit
                    ))),
                },
                None => call().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                error!(operation, attempt, error = %err, "Non-retryable failure");
                return Err(into_processing(err));
            }

            last_reason = err.to_string();

            if attempt < max_attempts {
                let delay = self.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(operation, attempts = max_attempts, reason = %last_reason, "Retry budget exhausted");

        Err(AnalysisError::AnalysisUnavailable {
            attempts: max_attempts,
            reason: last_reason,
        })
    }
}

/// Caller-facing kinds pass through; everything else becomes `Processing`.
fn into_processing(err: AnalysisError) -> AnalysisError {
    match err {
        AnalysisError::ArchiveCorrupt(_)
        | AnalysisError::NoContentExtracted
        | AnalysisError::AnalysisUnavailable { .. }
        | AnalysisError::Processing(_) => err,
        other => AnalysisError::Processing(other.to_string()),
    }
}
