//! Credits ledger repository.
//!
//! The only writer of the balance fields on `users`. Every mutation
//! locks the account row, applies the balance change, and appends an
//! immutable `credit_transactions` entry inside one transaction, so a
//! failed operation leaves no trace and concurrent debits can never
//! both spend the same credits.

use sqlx::PgPool;

use reelforge_core::types::{DbId, Timestamp};

use crate::error::LedgerError;
use crate::models::credit::{CreditBalance, CreditTransaction};
use crate::models::status::{CreditTransactionType, StatusId, SubscriptionTier};

/// Column list for `credit_transactions` queries.
const TX_COLUMNS: &str = "\
    id, user_id, amount, transaction_type_id, description, \
    reference_id, balance_after, created_at";

/// Maximum page size for transaction history.
const MAX_LIMIT: i64 = 100;

/// Provides atomic debit/credit operations and ledger reads.
pub struct CreditRepo;

impl CreditRepo {
    /// Current balance, tier, expiry, and lifetime usage for an account.
    ///
    /// Plain read; may observe a value that a concurrent debit is about
    /// to change. Only the mutating paths serialise on the row.
    pub async fn get_balance(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<CreditBalance, LedgerError> {
        sqlx::query_as::<_, CreditBalance>(
            "SELECT id AS user_id, credits_remaining, lifetime_credits_used, \
                    subscription_tier_id, subscription_expires_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LedgerError::UserNotFound(user_id))
    }

    /// Atomically deduct `amount` credits from an account.
    ///
    /// Within one transaction: lock the account row, verify the balance
    /// covers the amount, persist the new balance plus incremented
    /// lifetime usage, and append the ledger entry with its
    /// `balance_after` snapshot. Any error rolls the whole thing back.
    ///
    /// Debits are recorded with a negative `amount`; callers use
    /// `Generation` for metered work (passing the job id as
    /// `reference_id`) and `Adjustment` for manual corrections.
    pub async fn debit(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        tx_type: CreditTransactionType,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<CreditTransaction, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = pool.begin().await?;

        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT credits_remaining, lifetime_credits_used \
             FROM users WHERE id = $1 \
             FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (balance, lifetime_used) = row.ok_or(LedgerError::UserNotFound(user_id))?;

        if balance < amount {
            return Err(LedgerError::InsufficientCredits {
                available: balance,
                requested: amount,
            });
        }

        let new_balance = balance - amount;
        sqlx::query(
            "UPDATE users \
             SET credits_remaining = $2, lifetime_credits_used = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(new_balance)
        .bind(lifetime_used + amount)
        .execute(&mut *tx)
        .await?;

        let entry =
            Self::append_entry(&mut tx, user_id, -amount, tx_type, description, reference_id, new_balance)
                .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Atomically add `amount` credits to an account.
    ///
    /// Same lock-read-write-log shape as [`CreditRepo::debit`], with a
    /// positive ledger amount and no effect on lifetime usage.
    pub async fn credit(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        tx_type: CreditTransactionType,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<CreditTransaction, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = pool.begin().await?;

        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT credits_remaining FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (balance,) = row.ok_or(LedgerError::UserNotFound(user_id))?;

        let new_balance = balance + amount;
        sqlx::query(
            "UPDATE users SET credits_remaining = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(new_balance)
        .execute(&mut *tx)
        .await?;

        let entry =
            Self::append_entry(&mut tx, user_id, amount, tx_type, description, reference_id, new_balance)
                .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Return credits for a charged job that failed terminally.
    pub async fn refund(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<CreditTransaction, LedgerError> {
        Self::credit(
            pool,
            user_id,
            amount,
            CreditTransactionType::Refund,
            description,
            reference_id,
        )
        .await
    }

    /// Paginated transaction history for an account, newest first.
    pub async fn list_transactions(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {TX_COLUMNS} FROM credit_transactions \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(user_id)
            .bind(limit.min(MAX_LIMIT))
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Update an account's subscription tier and expiry.
    ///
    /// Does not grant credits; plan provisioning pairs this with a
    /// [`CreditRepo::credit`] call of type `Subscription`.
    pub async fn set_subscription(
        pool: &PgPool,
        user_id: DbId,
        tier: SubscriptionTier,
        expires_at: Option<Timestamp>,
        external_ref: Option<&str>,
    ) -> Result<(), LedgerError> {
        let updated = sqlx::query(
            "UPDATE users \
             SET subscription_tier_id = $2, subscription_expires_at = $3, \
                 subscription_external_ref = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(tier.id())
        .bind(expires_at)
        .bind(external_ref)
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::UserNotFound(user_id));
        }
        Ok(())
    }

    /// Append a ledger row within the caller's transaction.
    async fn append_entry(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: DbId,
        amount: i64,
        tx_type: CreditTransactionType,
        description: &str,
        reference_id: Option<&str>,
        balance_after: i64,
    ) -> Result<CreditTransaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO credit_transactions \
                (user_id, amount, transaction_type_id, description, reference_id, balance_after) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {TX_COLUMNS}"
        );
        sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(user_id)
            .bind(amount)
            .bind(StatusId::from(tx_type))
            .bind(description)
            .bind(reference_id)
            .bind(balance_after)
            .fetch_one(&mut **tx)
            .await
    }
}
