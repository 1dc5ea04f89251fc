//! The execution seam between the queue and whatever performs the work.

use async_trait::async_trait;

use reelforge_core::scheduling::JobKind;
use reelforge_db::models::job::Job;

/// How a job execution failed.
///
/// The distinction drives the runner's reporting: retryable failures go
/// back to the queue with backoff; fatal ones are terminal immediately,
/// regardless of remaining attempts.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Transient failure (provider timeout, connection reset). Worth
    /// another attempt.
    #[error("{0}")]
    Retryable(String),

    /// Permanent failure (malformed payload, unsupported parameters).
    /// Retrying would fail the same way.
    #[error("{0}")]
    Fatal(String),
}

/// Executes claimed jobs.
///
/// Implementations live in the application layer next to the provider
/// clients; the runner only needs the kind filter and the execution
/// entry point.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kinds this handler claims. Used as the claim filter so a
    /// worker fleet can be partitioned by capability.
    fn kinds(&self) -> &[JobKind];

    /// Execute one claimed job and return its result payload.
    async fn run(&self, job: &Job) -> Result<serde_json::Value, HandlerError>;
}
