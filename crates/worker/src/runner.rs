//! The claim-execute-report loop.
//!
//! Polls the queue on an interval and drains it one job at a time.
//! Claiming goes through `JobRepo::claim`, so any number of runner
//! instances can share a queue without double-execution.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use reelforge_db::models::job::Job;
use reelforge_db::repositories::JobRepo;

use crate::handler::{HandlerError, JobHandler};

/// Default polling interval for the runner loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Base delay for the first retry of a failed attempt.
const BACKOFF_BASE: Duration = Duration::from_secs(30);

/// Upper bound on the retry delay.
const BACKOFF_CAP: Duration = Duration::from_secs(3_600);

/// Retry delay for a job that has already made `attempts` attempts.
///
/// Doubles per attempt from [`BACKOFF_BASE`], capped at [`BACKOFF_CAP`]:
/// 30s, 60s, 120s, ...
pub fn retry_backoff(attempts: i32) -> Duration {
    let exp = attempts.saturating_sub(1).clamp(0, 30) as u32;
    BACKOFF_BASE
        .saturating_mul(2_u32.saturating_pow(exp))
        .min(BACKOFF_CAP)
}

/// A single worker's claim-execute-report loop.
pub struct Runner {
    pool: PgPool,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
}

impl Runner {
    /// Create a new runner with the default 1-second poll interval.
    pub fn new(pool: PgPool, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            pool,
            handler,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain(&cancel).await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
    }

    /// Claim and execute jobs until the queue has nothing eligible.
    ///
    /// Returns the number of jobs executed. Stops early on shutdown so
    /// a deep backlog cannot delay process exit.
    pub async fn drain(&self, cancel: &CancellationToken) -> Result<u32, sqlx::Error> {
        let mut executed = 0;
        while !cancel.is_cancelled() {
            match JobRepo::claim(&self.pool, Some(self.handler.kinds())).await? {
                None => break,
                Some(job) => {
                    self.execute(job).await?;
                    executed += 1;
                }
            }
        }
        Ok(executed)
    }

    /// Execute one claimed job and report the outcome.
    async fn execute(&self, job: Job) -> Result<(), sqlx::Error> {
        tracing::info!(
            job_id = job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Job claimed",
        );

        match self.handler.run(&job).await {
            Ok(result) => {
                let reported = JobRepo::complete(&self.pool, job.id, &result).await?;
                tracing::info!(job_id = job.id, reported, "Job completed");
            }
            Err(HandlerError::Retryable(msg)) => {
                let delay = retry_backoff(job.attempts);
                let requeued =
                    JobRepo::fail_with_backoff(&self.pool, job.id, &msg, delay).await?;
                if requeued {
                    tracing::warn!(
                        job_id = job.id,
                        delay_secs = delay.as_secs(),
                        error = %msg,
                        "Job failed; retry scheduled",
                    );
                } else {
                    tracing::error!(job_id = job.id, error = %msg, "Job failed; attempts exhausted");
                }
            }
            Err(HandlerError::Fatal(msg)) => {
                JobRepo::fail(&self.pool, job.id, &msg, false).await?;
                tracing::error!(job_id = job.id, error = %msg, "Job failed permanently");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_backoff(1), Duration::from_secs(30));
        assert_eq!(retry_backoff(2), Duration::from_secs(60));
        assert_eq!(retry_backoff(3), Duration::from_secs(120));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_backoff(10), BACKOFF_CAP);
        assert_eq!(retry_backoff(i32::MAX), BACKOFF_CAP);
    }

    #[test]
    fn backoff_tolerates_zero_attempts() {
        assert_eq!(retry_backoff(0), Duration::from_secs(30));
    }
}
