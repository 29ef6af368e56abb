//! Retry with exponential backoff for external API calls
//!
//! **Backoff Strategy:**
//! - Delay before retry `n`: `base_delay * 2^(n-1)`, capped at `max_delay`
//! - Full jitter: the actual sleep is uniform in `0..=capped`
//! - A server-provided `Retry-After` replaces the jittered delay (still capped)
//! - Non-retryable errors fail immediately

use hallyu_common::config::SyncConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that can tell whether another attempt may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-requested wait before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retry policy for one external operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Upper bound of the sleep after `failed_attempts` failures
    pub fn backoff_ceiling(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failed_attempts - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Jittered sleep after `failed_attempts` failures
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let ceiling_ms = self.backoff_ceiling(failed_attempts).as_millis() as u64;
        if ceiling_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "External call succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "External call failed: retries exhausted"
                    );
                    return Err(err);
                }

                let delay = match err.retry_after() {
                    Some(requested) => requested.min(policy.max_delay),
                    None => policy.delay_for_attempt(attempt),
                };

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "External call failed, will retry after backoff"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum FakeError {
        Transient,
        Permanent,
        Throttled(Duration),
    }

    impl Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            !matches!(self, FakeError::Permanent)
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                FakeError::Throttled(d) => Some(*d),
                _ => None,
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_backoff_ceiling_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(500));

        assert_eq!(policy.backoff_ceiling(0), Duration::ZERO);
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_ceiling(4), Duration::from_millis(500));
        assert_eq!(policy.backoff_ceiling(40), Duration::from_millis(500));
    }

    #[test]
    fn test_jittered_delay_within_ceiling() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(1000));
        for attempt in 1..6 {
            assert!(policy.delay_for_attempt(attempt) <= policy.backoff_ceiling(attempt));
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff("fake", &fast_policy(3), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(FakeError::Transient)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), FakeError> = retry_with_backoff("fake", &fast_policy(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Permanent)
            }
        })
        .await;

        assert!(matches!(result, Err(FakeError::Permanent)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), FakeError> = retry_with_backoff("fake", &fast_policy(4), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Throttled(Duration::from_millis(1)))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    /// Fails once with `first`, then succeeds; returns the time slept
    async fn elapsed_after_one_failure(policy: RetryPolicy, first: FakeError) -> Duration {
        let mut pending = Some(first);
        let started = tokio::time::Instant::now();

        retry_with_backoff("fake", &policy, || {
            let outcome = pending.take();
            async move {
                match outcome {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        })
        .await
        .unwrap();

        started.elapsed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_replaces_jittered_delay() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60), Duration::from_secs(120));

        let slept = elapsed_after_one_failure(policy, FakeError::Throttled(Duration::from_secs(7))).await;

        assert_eq!(slept, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_capped_at_max_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(10));

        let slept = elapsed_after_one_failure(policy, FakeError::Throttled(Duration::from_secs(300))).await;

        assert_eq!(slept, Duration::from_secs(10));
    }
}
