//! Retry with exponential back-off and jitter for engine calls.
//!
//! [`retry_with_backoff`] re-runs an engine call on transient failures
//! (rate limiting, connection problems, 5xx). Auth and malformed responses are
//! returned after the first attempt. Back-off sleeps end early when the
//! cancellation token fires.

use std::future::Future;
use std::time::Duration;

use geobench_core::AppConfig;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }

    /// Delay before retry number `retry` (1-based), before jitter.
    #[must_use]
    pub fn backoff_ms(&self, retry: u32) -> u64 {
        let computed = self
            .base_delay_ms
            .saturating_mul(1u64 << retry.saturating_sub(1).min(20));
        computed.min(self.max_delay_ms)
    }
}

/// Why [`retry_with_backoff`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// The last error, either non-retriable or the final transient one.
    Failed { error: EngineError, attempts: u32 },
    /// Stop was requested during a back-off sleep.
    Cancelled { attempts: u32 },
}

/// Runs `operation` until it succeeds, fails fatally, runs out of attempts,
/// or `cancel` fires during a back-off.
///
/// Back-off before retry `n` is `base_delay_ms × 2^(n-1)`, capped at
/// `max_delay_ms`, with ±25 % jitter. Returns the value with the number of
/// attempts made.
///
/// # Errors
///
/// Returns [`RetryError::Failed`] with the last error and attempt count, or
/// [`RetryError::Cancelled`] if stopped while waiting to retry.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<(T, u32), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => err,
        };

        if !err.class().is_transient() || attempt >= max_attempts {
            return Err(RetryError::Failed {
                error: err,
                attempts: attempt,
            });
        }

        let capped = policy.backoff_ms(attempt);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms,
            error = %err,
            "transient engine error, retrying after back-off"
        );

        tokio::select! {
            () = cancel.cancelled() => {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    fn auth_err() -> EngineError {
        EngineError::Auth {
            status: 401,
            message: "invalid x-api-key".to_owned(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ms(1), 2_000);
        assert_eq!(policy.backoff_ms(2), 4_000);
        assert_eq!(policy.backoff_ms(3), 8_000);
        assert_eq!(policy.backoff_ms(10), 60_000);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(fast_policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, EngineError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), (42, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(fast_policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(auth_err())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Auth must not be retried");
        assert_eq!(
            result.unwrap_err(),
            RetryError::Failed {
                error: auth_err(),
                attempts: 1
            }
        );
    }

    #[tokio::test]
    async fn malformed_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(fast_policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(EngineError::Malformed("no text".to_owned()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Failed { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(fast_policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(EngineError::RateLimit {
                        message: "slow down".to_owned(),
                    })
                } else {
                    Ok::<u32, EngineError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), (99, 3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_with_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(fast_policy(3), &CancellationToken::new(), || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<u32, _>(EngineError::ServerError {
                    status: 500 + u16::try_from(n).unwrap(),
                    message: String::new(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(RetryError::Failed {
                error: EngineError::ServerError { status: 503, .. },
                attempts: 3
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_observes_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(RetryPolicy::default(), &cancel, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(EngineError::Connection("reset".to_owned()))
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), RetryError::Cancelled { attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
