//! Utility modules for hallyu-sync

pub mod db_retry;
pub mod pool_monitor;
pub mod retry;

pub use db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
pub use pool_monitor::{begin_monitored, MonitoredTransaction};
pub use retry::{retry_with_backoff, RetryPolicy, Retryable};
