//! Retry policies and the backoff executor.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::ports::PortError;

/// Bounded-attempt retry with doubling backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy for local and deterministic external steps.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(30),
        }
    }

    /// Policy for the external order-creation call.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Backoff before the given retry (1-based attempt that just failed).
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Outcome of an exhausted or aborted retry loop.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt failed with a transient error.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        last: String,
    },
    /// A fatal error stopped the loop immediately.
    #[error("{operation} failed: {reason}")]
    Fatal {
        operation: &'static str,
        reason: String,
    },
    /// The stored file cannot be parsed; routes to re-upload.
    #[error("{operation} blocked: {reason}")]
    Blocked {
        operation: &'static str,
        reason: String,
    },
}

/// Run `op` under the policy. Transient errors retry silently with
/// backoff until exhaustion; fatal and blocked errors stop at once.
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PortError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(PortError::Fatal(reason)) => {
                return Err(RetryError::Fatal { operation, reason });
            }
            Err(PortError::Blocked(reason)) => {
                return Err(RetryError::Blocked { operation, reason });
            }
            Err(PortError::Transient(reason)) => {
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted {
                        operation,
                        attempts: attempt,
                        last: reason,
                    });
                }
                let backoff = policy.backoff(attempt);
                warn!(operation, attempt, ?backoff, %reason, "transient failure, retrying");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.backoff(1), Duration::from_secs(5));
        assert_eq!(policy.backoff(2), Duration::from_secs(10));
        assert_eq!(policy.backoff(3), Duration::from_secs(20));
        assert_eq!(policy.backoff(4), Duration::from_secs(30));

        let aggressive = RetryPolicy::aggressive();
        assert_eq!(aggressive.backoff(4), Duration::from_secs(40));
        assert_eq!(aggressive.backoff(5), Duration::from_secs(60));
        assert_eq!(aggressive.backoff(9), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(RetryPolicy::standard(), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PortError::Transient("busy".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempt_count() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(RetryPolicy::standard(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortError::Transient("down".to_string())) }
        })
        .await;

        match result.unwrap_err() {
            RetryError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(RetryPolicy::aggressive(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortError::Fatal("bad request".to_string())) }
        })
        .await;

        assert!(matches!(result.unwrap_err(), RetryError::Fatal { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
