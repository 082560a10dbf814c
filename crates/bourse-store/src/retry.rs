//! Bounded retry of infra contention.
//!
//! Only errors with [`BourseError::is_retryable`] are retried. Domain
//! errors surface on the first attempt.

use std::thread;
use std::time::Duration;

use bourse_types::{BourseError, Result, RetryPolicy};
use tracing::warn;

/// Run `attempt` until it succeeds, fails with a domain error, or the
/// policy's attempts are spent.
///
/// Backoff grows linearly with the attempt number.
///
/// # Errors
/// The domain error as-is, or `RetriesExhausted` wrapping the last infra
/// error.
pub fn with_retry<T, F>(policy: &RetryPolicy, label: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max = policy.max_attempts.max(1);
    let mut n = 0u32;
    loop {
        n += 1;
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                if n >= max {
                    return Err(BourseError::RetriesExhausted {
                        attempts: n,
                        last: err.to_string(),
                    });
                }
                warn!(label, attempt = n, error = %err, "transient failure, retrying");
                thread::sleep(Duration::from_millis(policy.backoff_ms * u64::from(n)));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_ms: 0,
            lock_wait_ms: 1,
        }
    }

    fn timeout() -> BourseError {
        BourseError::LockTimeout {
            resource: "test".to_string(),
        }
    }

    #[test]
    fn transient_then_success() {
        let mut calls = 0;
        let value = with_retry(&policy(3), "t", || {
            calls += 1;
            if calls < 3 { Err(timeout()) } else { Ok(calls) }
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut calls = 0;
        let err = with_retry::<(), _>(&policy(2), "t", || {
            calls += 1;
            Err(timeout())
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(err, BourseError::RetriesExhausted { attempts: 2, .. }));
    }

    #[test]
    fn domain_errors_are_not_retried() {
        let mut calls = 0;
        let err = with_retry::<(), _>(&policy(5), "t", || {
            calls += 1;
            Err(BourseError::InvalidAmount {
                reason: "no".to_string(),
            })
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, BourseError::InvalidAmount { .. }));
    }
}
