//! Credit pricing, amount validation, and subscription tier rules.
//!
//! Pure functions and constants shared by the ledger repository and the
//! billing callers. Lives in `core` to maintain the zero internal
//! dependency constraint.

use crate::error::CoreError;
use crate::scheduling::JobKind;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Credits charged for one image generation.
pub const COST_IMAGE_GENERATION: i64 = 5;

/// Credits charged for one video generation.
pub const COST_VIDEO_GENERATION: i64 = 50;

/// Credits charged for one audio generation.
pub const COST_AUDIO_GENERATION: i64 = 10;

/// Credits charged for one text/story expansion.
pub const COST_TEXT_EXPANSION: i64 = 1;

/// Monthly credit grant for the free tier.
pub const GRANT_FREE: i64 = 50;

/// Monthly credit grant for the pro tier.
pub const GRANT_PRO: i64 = 1_000;

/// Monthly credit grant for the enterprise tier.
pub const GRANT_ENTERPRISE: i64 = 10_000;

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Credits charged for a single generation of the given kind.
pub fn generation_cost(kind: JobKind) -> i64 {
    match kind {
        JobKind::ImageGeneration => COST_IMAGE_GENERATION,
        JobKind::VideoGeneration => COST_VIDEO_GENERATION,
        JobKind::AudioGeneration => COST_AUDIO_GENERATION,
        JobKind::TextExpansion => COST_TEXT_EXPANSION,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a debit/credit magnitude.
///
/// Credits are whole units; the sign is implied by the operation, so a
/// caller must never pass a negative or zero amount.
pub fn validate_amount(amount: i64) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::Validation(format!(
            "Credit amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subscription tiers
// ---------------------------------------------------------------------------

/// Whether a subscription is active at `now`.
///
/// A missing expiry means the subscription never lapses (free tier, or a
/// comped account).
pub fn subscription_is_active(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    match expires_at {
        Some(expiry) => expiry > now,
        None => true,
    }
}
