//! Quota Module
//!
//! Per-plan daily usage accounting: the static tier limit table and the
//! store-backed ledger that consumes against it.

pub mod ledger;
pub mod plan;

pub use ledger::{ConsumeOutcome, UsageIncrement, UsageLedger, UsageRecord, UsageSnapshot};
pub use plan::{actions, exam_batch, Identity, PlanLimits, PlanTier};
