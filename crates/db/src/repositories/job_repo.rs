//! Repository for the `jobs` table.
//!
//! Claiming uses `SELECT FOR UPDATE SKIP LOCKED` so any number of
//! concurrent workers can poll without ever receiving the same job or
//! blocking behind each other's locks.

use std::time::Duration;

use sqlx::PgPool;

use reelforge_core::scheduling::{JobKind, JobPriority, PRIORITY_NORMAL};
use reelforge_core::types::DbId;

use crate::error::QueueError;
use crate::models::job::{Job, JobListQuery, KindCount, QueueStats, StatusCount, SubmitJob};
use crate::models::status::{JobStatus, StatusId};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, owner_id, priority, \
    payload, result, error_message, \
    attempts, max_attempts, \
    scheduled_for, created_at, started_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Default attempt cap for new jobs.
const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Terminal statuses: completed, failed, cancelled.
const TERMINAL_STATUSES: [StatusId; 3] = [
    JobStatus::Completed as StatusId,
    JobStatus::Failed as StatusId,
    JobStatus::Cancelled as StatusId,
];

/// Provides queue operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job. Returns immediately with the job row.
    ///
    /// Validates the job type against the closed kind set and the
    /// priority weight against the known tiers before touching the
    /// store. An unknown owner surfaces as the foreign-key violation.
    pub async fn submit(
        pool: &PgPool,
        owner_id: DbId,
        input: &SubmitJob,
    ) -> Result<Job, QueueError> {
        if JobKind::parse(&input.job_type).is_err() {
            return Err(QueueError::UnknownKind(input.job_type.clone()));
        }

        let priority = input.priority.unwrap_or(PRIORITY_NORMAL);
        if JobPriority::from_weight(priority).is_none() {
            return Err(QueueError::InvalidPriority(priority));
        }

        let max_attempts = input.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts < 1 {
            return Err(QueueError::InvalidMaxAttempts(max_attempts));
        }

        let query = format!(
            "INSERT INTO jobs \
                (job_type, status_id, owner_id, priority, payload, max_attempts, scheduled_for) \
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW())) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(&input.job_type)
            .bind(JobStatus::Pending.id())
            .bind(owner_id)
            .bind(priority)
            .bind(&input.payload)
            .bind(max_attempts)
            .bind(input.scheduled_for)
            .fetch_one(pool)
            .await?;
        Ok(job)
    }

    /// Atomically claim the single best eligible pending job.
    ///
    /// Eligibility: pending, due (`scheduled_for <= NOW()`), and below
    /// its attempt cap. Ordering: priority descending, then earliest
    /// `scheduled_for`, then insertion order. The claimed job moves to
    /// processing with `started_at` stamped and `attempts` incremented.
    ///
    /// `FOR UPDATE SKIP LOCKED` guarantees at-most-one claimant per job
    /// under concurrent callers; a candidate locked by another claimant
    /// is skipped in favour of the next-best row instead of blocking.
    ///
    /// Returns `Ok(None)` when no eligible job exists; an expected
    /// empty poll, not an error.
    pub async fn claim(
        pool: &PgPool,
        kinds: Option<&[JobKind]>,
    ) -> Result<Option<Job>, sqlx::Error> {
        if let Some(kinds) = kinds {
            let kind_strs: Vec<String> =
                kinds.iter().map(|k| k.as_str().to_string()).collect();
            let query = format!(
                "UPDATE jobs \
                 SET status_id = $1, started_at = NOW(), attempts = attempts + 1 \
                 WHERE id = ( \
                     SELECT id FROM jobs \
                     WHERE status_id = $2 \
                       AND scheduled_for <= NOW() \
                       AND attempts < max_attempts \
                       AND job_type = ANY($3) \
                     ORDER BY priority DESC, scheduled_for ASC, id ASC \
                     LIMIT 1 \
                     FOR UPDATE SKIP LOCKED \
                 ) \
                 RETURNING {COLUMNS}"
            );
            sqlx::query_as::<_, Job>(&query)
                .bind(JobStatus::Processing.id())
                .bind(JobStatus::Pending.id())
                .bind(&kind_strs)
                .fetch_optional(pool)
                .await
        } else {
            let query = format!(
                "UPDATE jobs \
                 SET status_id = $1, started_at = NOW(), attempts = attempts + 1 \
                 WHERE id = ( \
                     SELECT id FROM jobs \
                     WHERE status_id = $2 \
                       AND scheduled_for <= NOW() \
                       AND attempts < max_attempts \
                     ORDER BY priority DESC, scheduled_for ASC, id ASC \
                     LIMIT 1 \
                     FOR UPDATE SKIP LOCKED \
                 ) \
                 RETURNING {COLUMNS}"
            );
            sqlx::query_as::<_, Job>(&query)
                .bind(JobStatus::Processing.id())
                .bind(JobStatus::Pending.id())
                .fetch_optional(pool)
                .await
        }
    }

    /// Mark a processing job as completed with its result payload.
    ///
    /// Returns `true` if the job transitioned; `false` if it was not in
    /// processing (already completed, cancelled, or reaped), in which
    /// case the row is left untouched.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(result)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    /// Record a failed attempt.
    ///
    /// With `retry = true` and attempts remaining, the job goes back to
    /// pending (clearing `started_at`) and is immediately claimable
    /// again. Otherwise it is terminally failed with `completed_at`
    /// stamped. Returns `true` if the job was requeued for retry.
    pub async fn fail(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        retry: bool,
    ) -> Result<bool, sqlx::Error> {
        Self::fail_inner(pool, job_id, error, retry, None).await
    }

    /// Like [`JobRepo::fail`] with `retry = true`, but pushes
    /// `scheduled_for` into the future so the retry is delayed instead
    /// of immediately claimable.
    pub async fn fail_with_backoff(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        delay: Duration,
    ) -> Result<bool, sqlx::Error> {
        Self::fail_inner(pool, job_id, error, true, Some(delay)).await
    }

    async fn fail_inner(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        retry: bool,
        delay: Option<Duration>,
    ) -> Result<bool, sqlx::Error> {
        if retry {
            let requeued = sqlx::query(
                "UPDATE jobs \
                 SET status_id = $2, error_message = $3, started_at = NULL, \
                     scheduled_for = NOW() + make_interval(secs => $5) \
                 WHERE id = $1 AND status_id = $4 AND attempts < max_attempts",
            )
            .bind(job_id)
            .bind(JobStatus::Pending.id())
            .bind(error)
            .bind(JobStatus::Processing.id())
            .bind(delay.map_or(0.0, |d| d.as_secs_f64()))
            .execute(pool)
            .await?;
            if requeued.rows_affected() > 0 {
                return Ok(true);
            }
        }

        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(false)
    }

    /// Cancel a job if it is not already in a terminal state.
    ///
    /// Best-effort: a worker already executing the payload is not
    /// interrupted, but its completion report will find the row
    /// terminal and leave it alone. Returns `true` if the job was
    /// cancelled, `false` from any terminal state.
    pub async fn cancel(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4, $5)",
        )
        .bind(job_id)
        .bind(JobStatus::Cancelled.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return jobs stuck in processing to the queue.
    ///
    /// A job is stuck when its worker stopped reporting: `started_at`
    /// is older than `stuck_after` and the row never left processing.
    /// Jobs with attempts remaining go back to pending; exhausted ones
    /// are terminally failed. Returns `(requeued, failed)` counts.
    pub async fn requeue_stuck(
        pool: &PgPool,
        stuck_after: Duration,
    ) -> Result<(u64, u64), sqlx::Error> {
        let secs = stuck_after.as_secs_f64();

        let requeued = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, started_at = NULL, error_message = $3 \
             WHERE status_id = $2 \
               AND started_at < NOW() - make_interval(secs => $4) \
               AND attempts < max_attempts",
        )
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .bind("Worker stopped reporting; returned to queue")
        .bind(secs)
        .execute(pool)
        .await?;

        let failed = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, error_message = $3, completed_at = NOW() \
             WHERE status_id = $2 \
               AND started_at < NOW() - make_interval(secs => $4) \
               AND attempts >= max_attempts",
        )
        .bind(JobStatus::Failed.id())
        .bind(JobStatus::Processing.id())
        .bind("Worker stopped reporting; no attempts remaining")
        .bind(secs)
        .execute(pool)
        .await?;

        Ok((requeued.rows_affected(), failed.rows_affected()))
    }

    /// Delete terminal jobs whose `completed_at` is past the retention
    /// window. Returns the number of rows removed.
    ///
    /// Pending and processing jobs are never touched, regardless of age.
    pub async fn cleanup(pool: &PgPool, older_than_days: i32) -> Result<u64, sqlx::Error> {
        let deleted = sqlx::query(
            "DELETE FROM jobs \
             WHERE status_id IN ($1, $2, $3) \
               AND completed_at < NOW() - make_interval(days => $4)",
        )
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .bind(older_than_days)
        .execute(pool)
        .await?;
        Ok(deleted.rows_affected())
    }

    /// Aggregate queue counts for dashboards. No side effects.
    ///
    /// Status counts cover jobs created in the last 24 hours; the
    /// per-kind breakdown covers whatever is currently active.
    pub async fn stats(pool: &PgPool) -> Result<QueueStats, sqlx::Error> {
        let by_status_24h = sqlx::query_as::<_, StatusCount>(
            "SELECT status_id, COUNT(*) AS count FROM jobs \
             WHERE created_at > NOW() - INTERVAL '24 hours' \
             GROUP BY status_id \
             ORDER BY status_id",
        )
        .fetch_all(pool)
        .await?;

        let active_by_type = sqlx::query_as::<_, KindCount>(
            "SELECT job_type, COUNT(*) AS count FROM jobs \
             WHERE status_id IN ($1, $2) \
             GROUP BY job_type \
             ORDER BY job_type",
        )
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .fetch_all(pool)
        .await?;

        Ok(QueueStats {
            by_status_24h,
            active_by_type,
        })
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's jobs with optional status filter and pagination,
    /// newest first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        params: &JobListQuery,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        if let Some(status_id) = params.status_id {
            let query = format!(
                "SELECT {COLUMNS} FROM jobs \
                 WHERE owner_id = $1 AND status_id = $2 \
                 ORDER BY created_at DESC \
                 LIMIT $3 OFFSET $4"
            );
            sqlx::query_as::<_, Job>(&query)
                .bind(owner_id)
                .bind(status_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        } else {
            let query = format!(
                "SELECT {COLUMNS} FROM jobs \
                 WHERE owner_id = $1 \
                 ORDER BY created_at DESC \
                 LIMIT $2 OFFSET $3"
            );
            sqlx::query_as::<_, Job>(&query)
                .bind(owner_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
    }
}
