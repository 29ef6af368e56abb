//! Instrumented transactions
//!
//! Logs how long a pooled connection was awaited and how long the
//! transaction held it, to spot pool saturation while batch jobs run.

use hallyu_common::Result;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

const SLOW_ACQUIRE_MS: u128 = 1000;
const LONG_HOLD_MS: u128 = 2000;

/// Hold-time bookkeeping; a transaction dropped without commit or rollback
/// is reported when this drops unfinished
struct HoldTimer {
    caller: &'static str,
    acquired_at: Instant,
    finished: bool,
}

impl HoldTimer {
    fn finish(&mut self, how: &'static str) {
        self.finished = true;
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_HOLD_MS {
            tracing::warn!(caller = self.caller, held_ms, how, "Long transaction");
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Transaction finished");
        }
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                caller = self.caller,
                held_ms = self.acquired_at.elapsed().as_millis(),
                "Transaction dropped, rolled back"
            );
        }
    }
}

/// SQLite transaction that logs its acquisition and hold time
pub struct MonitoredTransaction<'c> {
    tx: Transaction<'c, Sqlite>,
    timer: HoldTimer,
}

impl MonitoredTransaction<'_> {
    pub async fn commit(self) -> Result<()> {
        let Self { tx, mut timer } = self;
        tx.commit().await?;
        timer.finish("commit");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        let Self { tx, mut timer } = self;
        tx.rollback().await?;
        timer.finish("rollback");
        Ok(())
    }

    /// Connection of the open transaction, for use as a query executor
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

/// Begin a monitored transaction on `pool`
///
/// ```ignore
/// let mut tx = begin_monitored(&pool, "artist_merger::merge").await?;
/// sqlx::query("DELETE FROM artists WHERE id = ?").bind(id).execute(tx.conn()).await?;
/// tx.commit().await?;
/// ```
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let requested_at = Instant::now();
    let tx = pool.begin().await?;

    let wait_ms = requested_at.elapsed().as_millis();
    if wait_ms > SLOW_ACQUIRE_MS {
        tracing::warn!(caller, wait_ms, "Slow connection acquisition, pool may be saturated");
    } else {
        tracing::trace!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        timer: HoldTimer {
            caller,
            acquired_at: Instant::now(),
            finished: false,
        },
    })
}
