//! Credits ledger models.

use reelforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An immutable ledger row from the `credit_transactions` table.
///
/// Created once per balance mutation and never updated or deleted by
/// normal operation; the sum of `amount` over a user's rows equals the
/// cached balance on the user record.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditTransaction {
    pub id: DbId,
    pub user_id: DbId,
    /// Negative for debits, positive for credits.
    pub amount: i64,
    pub transaction_type_id: StatusId,
    pub description: String,
    /// Correlates to a job id or an external payment id.
    pub reference_id: Option<String>,
    /// Balance snapshot taken after this entry was applied.
    pub balance_after: i64,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// Balance view of a single account.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditBalance {
    pub user_id: DbId,
    pub credits_remaining: i64,
    pub lifetime_credits_used: i64,
    pub subscription_tier_id: StatusId,
    pub subscription_expires_at: Option<Timestamp>,
}
