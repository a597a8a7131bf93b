//! Cross-instance job exclusion via PostgreSQL advisory locks.
//!
//! Scheduler jobs run on every instance's timer; only the instance that
//! wins `pg_try_advisory_lock` for the job key actually executes. Session
//! advisory locks live on one connection, so the lock pins its pooled
//! connection until released.

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Row};

use crate::market::error::MarketError;

/// A held advisory lock. Release explicitly with [`JobLock::release`];
/// pooled connections outlive a drop, so dropping without releasing would
/// leave the job key held.
pub struct JobLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

impl JobLock {
    /// Try to take the named lock. `None` means another instance holds it
    /// and this tick should be skipped - that is not an error.
    pub async fn try_acquire(pool: &PgPool, key: i64) -> Result<Option<JobLock>, MarketError> {
        let mut conn = pool.acquire().await?;

        let row = sqlx::query("SELECT pg_try_advisory_lock($1) AS acquired")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;
        let acquired: bool = row.get("acquired");

        if acquired {
            Ok(Some(JobLock { conn, key }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(mut self) -> Result<(), MarketError> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
