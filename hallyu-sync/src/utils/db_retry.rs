//! Retry of SQLite writes that hit a locked database
//!
//! Batch sync workers and HTTP-triggered merges write concurrently, so a
//! transaction may find the database locked even with WAL and a busy
//! timeout. Only lock errors are retried; every other error is returned as is.

use hallyu_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Default total time spent retrying a locked write
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Sleep schedule between lock retries: 10 ms, doubling, capped at 1 s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockBackoff {
    next: Duration,
}

impl LockBackoff {
    const INITIAL: Duration = Duration::from_millis(10);
    const CAP: Duration = Duration::from_millis(1000);

    fn new() -> Self {
        Self { next: Self::INITIAL }
    }

    /// Delay to sleep now; advances the schedule
    fn step(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(Self::CAP);
        delay
    }
}

/// Run `operation` until it succeeds, fails with a non-lock error, or
/// `max_wait_ms` has elapsed since the first attempt
///
/// `operation` must restart its transaction from scratch on every call.
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let deadline = Duration::from_millis(max_wait_ms);
    let mut backoff = LockBackoff::new();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis(),
                        "Locked write went through"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_error() => err,
            Err(err) => return Err(err),
        };

        let elapsed = started.elapsed();
        if elapsed >= deadline {
            tracing::error!(
                operation = operation_name,
                attempts,
                elapsed_ms = elapsed.as_millis(),
                error = %err,
                "Giving up on locked database"
            );
            return Err(Error::Internal(format!(
                "{}: database still locked after {} attempts in {} ms",
                operation_name,
                attempts,
                elapsed.as_millis()
            )));
        }

        let delay = backoff.step();
        tracing::warn!(
            operation = operation_name,
            attempts,
            delay_ms = delay.as_millis(),
            "Database locked, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
