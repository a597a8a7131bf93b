//! Scheduler loop - timer-driven market maintenance.
//!
//! Every instance runs the same loop; per-job advisory locks make sure
//! each job executes on exactly one instance per tick. Losing the lock is
//! a normal skip, not an error.

pub mod job_lock;

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::market::error::MarketError;
use crate::market::settlement::SettlementService;
use crate::market::types::SweepOutcome;
use crate::roster::RosterStore;
use job_lock::JobLock;

/// Scheduler jobs. Keys are stable across versions; changing one would
/// let two releases run the same job concurrently during a rolling deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    CloseExpiredAuctions,
    RosterLockMaintenance,
}

impl Job {
    pub const ALL: [Job; 2] = [Job::CloseExpiredAuctions, Job::RosterLockMaintenance];

    pub fn key(&self) -> i64 {
        match self {
            Job::CloseExpiredAuctions => 0x4C47_4D4B_0001,
            Job::RosterLockMaintenance => 0x4C47_4D4B_0002,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Job::CloseExpiredAuctions => "close-expired-auctions",
            Job::RosterLockMaintenance => "roster-lock-maintenance",
        }
    }
}

pub struct Scheduler {
    pool: PgPool,
    settlement: Arc<SettlementService>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(pool: PgPool, settlement: Arc<SettlementService>, tick_secs: u64) -> Self {
        Self {
            pool,
            settlement,
            tick_interval: Duration::from_secs(tick_secs),
        }
    }

    /// Run the scheduler loop forever.
    pub async fn run(&self) {
        info!(tick_interval = ?self.tick_interval, "Scheduler starting");
        loop {
            self.tick().await;
            sleep(self.tick_interval).await;
        }
    }

    /// One pass over all jobs. Public so tests and on-demand maintenance
    /// can drive a single tick.
    pub async fn tick(&self) {
        for job in Job::ALL {
            let lock = match JobLock::try_acquire(&self.pool, job.key()).await {
                Ok(Some(lock)) => lock,
                Ok(None) => {
                    debug!(job = job.name(), "Skipping tick: lock held elsewhere");
                    continue;
                }
                Err(e) => {
                    warn!(job = job.name(), error = %e, "Could not acquire job lock");
                    continue;
                }
            };

            let result = self.run_job(job).await;
            if let Err(e) = lock.release().await {
                warn!(job = job.name(), error = %e, "Failed to release job lock");
            }
            if let Err(e) = result {
                error!(job = job.name(), error = %e, "Job failed");
            }
        }
    }

    async fn run_job(&self, job: Job) -> Result<(), MarketError> {
        match job {
            Job::CloseExpiredAuctions => {
                let outcome = self.close_expired_auctions().await?;
                if outcome.processed > 0 {
                    info!(
                        processed = outcome.processed,
                        settled = outcome.settled,
                        "Expired auctions closed"
                    );
                }
            }
            Job::RosterLockMaintenance => {
                let released = RosterStore::release_expired_locks(&self.pool, Utc::now()).await?;
                if released > 0 {
                    info!(released, "Expired roster locks cleared");
                }
            }
        }
        Ok(())
    }

    /// Sweep every league. One league's failure does not stop the rest.
    async fn close_expired_auctions(&self) -> Result<SweepOutcome, MarketError> {
        let league_ids: Vec<i64> =
            sqlx::query_scalar("SELECT league_id FROM leagues_tb ORDER BY league_id")
                .fetch_all(&self.pool)
                .await?;

        let mut total = SweepOutcome::default();
        for league_id in league_ids {
            match self.settlement.close_daily_auctions(league_id, None).await {
                Ok(outcome) => {
                    total.processed += outcome.processed;
                    total.settled += outcome.settled;
                }
                Err(e) => {
                    error!(league_id, error = %e, "League sweep failed");
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_keys_are_distinct() {
        let mut keys: Vec<i64> = Job::ALL.iter().map(Job::key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Job::ALL.len());
    }

    #[test]
    fn job_names_are_distinct() {
        let mut names: Vec<&str> = Job::ALL.iter().map(Job::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Job::ALL.len());
    }
}
