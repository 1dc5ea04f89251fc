//! Job entity models and DTOs for the generation job queue.

use reelforge_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub owner_id: DbId,
    pub priority: i32,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Incremented on every claim, not only on failure.
    pub attempts: i32,
    pub max_attempts: i32,
    /// Gates claim eligibility; defaults to the insertion time.
    pub scheduled_for: Timestamp,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// DTO for submitting a new job.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJob {
    pub job_type: String,
    pub payload: serde_json::Value,
    /// Priority weight. Defaults to normal (5).
    pub priority: Option<i32>,
    /// Defaults to 3.
    pub max_attempts: Option<i32>,
    /// Earliest execution time. Defaults to now.
    pub scheduled_for: Option<Timestamp>,
}

/// Query parameters for per-owner job listing.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 1 = pending, 4 = failed).
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Per-status job count for the stats rollup.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status_id: StatusId,
    pub count: i64,
}

/// Per-kind count of currently active (pending/processing) jobs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KindCount {
    pub job_type: String,
    pub count: i64,
}

/// Aggregate queue observability snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Counts by status for jobs created in the last 24 hours.
    pub by_status_24h: Vec<StatusCount>,
    /// Counts by job type for jobs that are still pending or processing.
    pub active_by_type: Vec<KindCount>,
}
