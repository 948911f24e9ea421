// src/retry.rs
use std::future::Future;
use std::time::Duration;

use crate::LedgerResult;

/// Bounded exponential backoff for whole-call retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Call `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. Only `Conflict` is retried; every call is a
/// fresh unit.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after conflict"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            multiplier: 2.0,
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
        assert_eq!(policy.backoff(4), Duration::from_millis(50));
        assert_eq!(policy.backoff(30), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_conflict_retried_until_success() {
        let calls = AtomicU32::new(0);

        let result = with_backoff(&fast(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LedgerError::Conflict("serialization failure".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);

        let result: LedgerResult<()> = with_backoff(&fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Conflict("again".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = AtomicU32::new(0);

        let result: LedgerResult<()> = with_backoff(&fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Persistence("balance check".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Persistence(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
