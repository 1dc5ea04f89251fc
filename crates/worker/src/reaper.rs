//! Queue maintenance loops.
//!
//! A crashed worker leaves its job in processing forever; the reaper
//! returns such jobs to the queue once their `started_at` passes a
//! timeout. The sweeper deletes terminal jobs past the retention
//! window. Both are safe to run on every worker node concurrently;
//! the underlying updates are plain row transitions.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use reelforge_db::repositories::JobRepo;

/// How often the retention sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Returns stuck processing jobs to the queue on an interval.
pub struct Reaper {
    pool: PgPool,
    stuck_after: Duration,
    check_interval: Duration,
}

impl Reaper {
    pub fn new(pool: PgPool, stuck_after: Duration, check_interval: Duration) -> Self {
        Self {
            pool,
            stuck_after,
            check_interval,
        }
    }

    /// Run the reaper loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.check_interval);
        tracing::info!(
            stuck_after_secs = self.stuck_after.as_secs(),
            "Stuck-job reaper started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stuck-job reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match JobRepo::requeue_stuck(&self.pool, self.stuck_after).await {
                        Ok((0, 0)) => {}
                        Ok((requeued, failed)) => {
                            tracing::warn!(requeued, failed, "Recovered stuck jobs");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Reaper cycle failed");
                        }
                    }
                }
            }
        }
    }
}

/// Deletes terminal jobs past the retention window, once a day.
pub struct Sweeper {
    pool: PgPool,
    retention_days: i32,
}

impl Sweeper {
    pub fn new(pool: PgPool, retention_days: i32) -> Self {
        Self {
            pool,
            retention_days,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        tracing::info!(retention_days = self.retention_days, "Retention sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match JobRepo::cleanup(&self.pool, self.retention_days).await {
                        Ok(0) => {}
                        Ok(deleted) => {
                            tracing::info!(deleted, "Swept expired jobs");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Sweep cycle failed");
                        }
                    }
                }
            }
        }
    }
}
