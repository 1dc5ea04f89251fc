//! Generation job scheduling constants, kinds, and state machine.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the repository layer and the worker process.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Priority value for low-urgency jobs. Dispatched last.
pub const PRIORITY_LOW: i32 = 1;

/// Priority value for normal jobs. Default.
pub const PRIORITY_NORMAL: i32 = 5;

/// Priority value for high-priority jobs.
pub const PRIORITY_HIGH: i32 = 10;

/// Priority value for urgent jobs. Dispatched before all others.
pub const PRIORITY_URGENT: i32 = 20;

/// Named priority tiers mapping to the stored numeric weights.
///
/// The weights are deliberately spaced out (1/5/10/20) so intermediate
/// tiers can be introduced later without renumbering existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl JobPriority {
    /// The numeric weight stored in the `jobs.priority` column.
    pub fn weight(self) -> i32 {
        match self {
            JobPriority::Low => PRIORITY_LOW,
            JobPriority::Normal => PRIORITY_NORMAL,
            JobPriority::High => PRIORITY_HIGH,
            JobPriority::Urgent => PRIORITY_URGENT,
        }
    }

    /// Resolve a stored weight back to its tier. Returns `None` for
    /// weights outside the known set.
    pub fn from_weight(weight: i32) -> Option<Self> {
        match weight {
            PRIORITY_LOW => Some(JobPriority::Low),
            PRIORITY_NORMAL => Some(JobPriority::Normal),
            PRIORITY_HIGH => Some(JobPriority::High),
            PRIORITY_URGENT => Some(JobPriority::Urgent),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Job kinds
// ---------------------------------------------------------------------------

/// The closed set of task kinds the queue accepts.
///
/// Stored as text in the `jobs.job_type` column; `as_str` values are the
/// canonical wire form. New kinds are added here first so submission
/// validation and worker claim filters stay in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ImageGeneration,
    VideoGeneration,
    AudioGeneration,
    TextExpansion,
}

impl JobKind {
    /// Every known kind, in declaration order.
    pub const ALL: [JobKind; 4] = [
        JobKind::ImageGeneration,
        JobKind::VideoGeneration,
        JobKind::AudioGeneration,
        JobKind::TextExpansion,
    ];

    /// Canonical column value for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::ImageGeneration => "image_generation",
            JobKind::VideoGeneration => "video_generation",
            JobKind::AudioGeneration => "audio_generation",
            JobKind::TextExpansion => "text_expansion",
        }
    }

    /// Parse a stored or submitted kind string.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "image_generation" => Ok(JobKind::ImageGeneration),
            "video_generation" => Ok(JobKind::VideoGeneration),
            "audio_generation" => Ok(JobKind::AudioGeneration),
            "text_expansion" => Ok(JobKind::TextExpansion),
            other => Err(CoreError::Validation(format!(
                "Unknown job type: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Job status IDs matching `job_statuses` seed data (1-based SMALLSERIAL).
///
/// The state machine is intentionally duplicated from the `db` crate's
/// `JobStatus` enum because `core` must have zero internal deps.
pub mod state_machine {
    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Completed=3, Failed=4, Cancelled=5) return an empty
    /// slice because no further transitions are allowed.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Pending -> Processing, Cancelled
            1 => &[2, 5],
            // Processing -> Completed, Failed, Pending (retry), Cancelled
            2 => &[3, 4, 1, 5],
            // Terminal states: Completed, Failed, Cancelled
            3 | 4 | 5 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Processing",
            3 => "Completed",
            4 => "Failed",
            5 => "Cancelled",
            _ => "Unknown",
        }
    }
}
