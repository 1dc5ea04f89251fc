//! Domain error types for the queue and ledger repositories.
//!
//! Plain CRUD repositories return `sqlx::Error` directly; these enums
//! exist for the two operations with real domain failure modes.

use reelforge_core::types::DbId;

/// Errors surfaced by job submission validation.
///
/// A claim finding no eligible job is NOT an error; it returns `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Unknown job type: {0}")]
    UnknownKind(String),

    #[error("Unknown priority weight: {0}")]
    InvalidPriority(i32),

    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(i32),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Errors surfaced by the credits ledger.
///
/// Every ledger mutation runs in a single transaction, so any error
/// here means the operation had no side effect at all.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Credit amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Insufficient credits: {available} available, {requested} requested")]
    InsufficientCredits { available: i64, requested: i64 },

    #[error("User not found: {0}")]
    UserNotFound(DbId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
