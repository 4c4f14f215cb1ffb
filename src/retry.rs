//! Retry execution with capped linear backoff
//!
//! Wraps a single fallible network operation with bounded retries. An empty
//! body counts as a failed attempt: several upstreams answer 200 with nothing
//! in it while they are degraded, and callers cannot use such a response.
//!
//! The backoff wait is raced against the caller's cancellation token, so a
//! canceled request never holds a worker for the remainder of a backoff
//! window. The executor is stateless; every call is independent.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};

/// Retry behavior for one logical fetch.
///
/// Constructed once and reused; a shared default lives in the gateway config
/// and adapters may override per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `failed + 1`, given `failed` completed failures.
    ///
    /// Grows linearly (1x, 2x, 3x the initial delay) and caps at `max_delay`.
    pub fn backoff_for(&self, failed: u32) -> Duration {
        let delay = self.initial_delay.saturating_mul(failed.max(1));
        delay.min(self.max_delay)
    }
}

/// Execute `attempt` until it yields a non-empty body or attempts run out.
///
/// Returns [`Error::Canceled`] if `cancel` fires during a backoff wait, and
/// [`Error::RetryExhausted`] wrapping the last underlying failure once all
/// attempts are spent.
pub async fn fetch_with_retry<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<Bytes>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Bytes>>,
{
    let mut last_err = Error::EmptyBody;

    for n in 1..=policy.max_attempts.max(1) {
        match attempt().await {
            Ok(body) if !body.is_empty() => return Ok(body),
            Ok(_) => last_err = Error::EmptyBody,
            Err(err) => last_err = err,
        }

        if n < policy.max_attempts {
            let delay = policy.backoff_for(n);
            warn!(
                attempt = n,
                max_attempts = policy.max_attempts,
                retry_in = ?delay,
                error = %last_err,
                "fetch attempt failed, retrying"
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => return Err(Error::Canceled),
            }
        }
    }

    Err(Error::RetryExhausted {
        attempts: policy.max_attempts,
        source: Box::new(last_err),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_backoff_grows_linearly_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(250));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fetch_with_retry(&quick_policy(), &cancel, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(b"payload"))
            }
        })
        .await;

        assert_eq!(result.unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_final_attempt_with_exact_invocations() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fetch_with_retry(&quick_policy(), &cancel, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Error::HttpStatus(502))
                } else {
                    Ok(Bytes::from_static(b"third time"))
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_body_counts_as_failure() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fetch_with_retry(&quick_policy(), &cancel, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::new())
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_matches!(
            result,
            Err(Error::RetryExhausted { attempts: 3, source }) if matches!(*source, Error::EmptyBody)
        );
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_error() {
        let cancel = CancellationToken::new();

        let result = fetch_with_retry(&quick_policy(), &cancel, || async {
            Err::<Bytes, _>(Error::HttpStatus(503))
        })
        .await;

        assert_matches!(
            result,
            Err(Error::RetryExhausted { attempts: 3, source }) if matches!(*source, Error::HttpStatus(503))
        );
    }

    #[tokio::test]
    async fn test_cancellation_aborts_backoff_promptly() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
        };
        let cancel = CancellationToken::new();
        let canceler = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceler.cancel();
        });

        let started = Instant::now();
        let result = fetch_with_retry(&policy, &cancel, || async {
            Err::<Bytes, _>(Error::HttpStatus(500))
        })
        .await;

        assert_matches!(result, Err(Error::Canceled));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "cancellation must not wait out the backoff window"
        );
    }

    #[tokio::test]
    async fn test_no_backoff_after_final_attempt() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
        };
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let result = fetch_with_retry(&policy, &cancel, || async {
            Err::<Bytes, _>(Error::HttpStatus(500))
        })
        .await;

        assert!(result.is_err());
        // One backoff between the two attempts, none trailing.
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
