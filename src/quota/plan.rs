//! Plan Tiers and Limit Table
//!
//! Static lookup of daily ceilings per plan tier. An identity whose paid
//! plan has expired resolves to the lowest tier for every lookup, even
//! though its nominal tier field still names the paid plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::UsageIncrement;

/// Subscription tier of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanTier {
    /// Lowest tier; also what every expired plan degrades to
    Free,
    /// Paid tier
    Standard,
    /// Paid tier, effectively unmetered
    Premium,
}

/// Daily ceilings for one tier; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Exams per day across all modes (the combo ceiling)
    pub exams_per_day: Option<u32>,

    /// Exams per day within a single mode
    pub exams_per_mode_per_day: Option<u32>,

    /// Authored questions per day
    pub authored_per_day: Option<u32>,

    /// Random question fetches per day, per content type
    pub random_fetch_per_day: Option<u32>,

    /// Questions per exam; only the lowest tier is capped
    pub exam_question_cap: Option<u32>,
}

impl PlanTier {
    /// Limit table row for this tier
    pub fn limits(&self) -> PlanLimits {
        match self {
            PlanTier::Free => PlanLimits {
                exams_per_day: Some(3),
                exams_per_mode_per_day: Some(2),
                authored_per_day: Some(5),
                random_fetch_per_day: Some(10),
                exam_question_cap: Some(10),
            },
            PlanTier::Standard => PlanLimits {
                exams_per_day: Some(20),
                exams_per_mode_per_day: Some(15),
                authored_per_day: Some(50),
                random_fetch_per_day: Some(100),
                exam_question_cap: None,
            },
            PlanTier::Premium => PlanLimits {
                exams_per_day: None,
                exams_per_mode_per_day: None,
                authored_per_day: None,
                random_fetch_per_day: None,
                exam_question_cap: None,
            },
        }
    }
}

/// Authenticated subject governed by quotas and sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable id (email or client id), verified upstream
    pub id: String,

    /// Nominal plan tier
    pub tier: PlanTier,

    /// Paid-plan expiry; `None` for never-expiring plans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Tier that actually applies: an elapsed expiry degrades to Free
    pub fn effective_tier(&self, now: DateTime<Utc>) -> PlanTier {
        match self.plan_expires_at {
            Some(expires) if expires < now => PlanTier::Free,
            _ => self.tier,
        }
    }

    /// Limit table row for the tier in effect
    pub fn effective_limits(&self, now: DateTime<Utc>) -> PlanLimits {
        self.effective_tier(now).limits()
    }
}

/// Action names for the governed features
pub mod actions {
    /// Authored questions per day
    pub const AUTHOR_QUESTION: &str = "author_question";

    /// Combined exam counter consumed by every exam mode
    pub const EXAM_COMBO: &str = "exam:combo";

    /// Per-mode exam counter
    pub fn exam_mode(mode: &str) -> String {
        format!("exam:{mode}")
    }

    /// Per-content-type random fetch counter
    pub fn random_fetch(content_type: &str) -> String {
        format!("random_fetch:{content_type}")
    }
}

/// Increment pair for one exam start: the mode counter plus the combo
/// counter, consumed as one all-or-nothing batch
pub fn exam_batch(limits: &PlanLimits, mode: &str) -> Vec<UsageIncrement> {
    vec![
        UsageIncrement {
            action: actions::exam_mode(mode),
            limit: limits.exams_per_mode_per_day,
            amount: 1,
        },
        UsageIncrement {
            action: actions::EXAM_COMBO.to_string(),
            limit: limits.exams_per_day,
            amount: 1,
        },
    ]
}
