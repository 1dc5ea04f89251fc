//! User entity model and DTOs.
//!
//! The credit balance fields on this row are owned by the ledger
//! repository; nothing else may write them.

use reelforge_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// Full user row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub credits_remaining: i64,
    /// Monotonically increasing; refunds do not wind it back.
    pub lifetime_credits_used: i64,
    pub subscription_tier_id: StatusId,
    pub subscription_expires_at: Option<Timestamp>,
    pub subscription_external_ref: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user.
///
/// Accounts start with a zero balance; starting credits are granted
/// through the ledger so the audit trail stays complete.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub display_name: String,
}
