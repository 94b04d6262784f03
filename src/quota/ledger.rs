//! Usage Quota Ledger
//!
//! Daily usage counters per (identity, action), consumed in all-or-nothing
//! batches so an action gated by several counters (a mode counter plus a
//! combo counter) never half-spends its quota.
//!
//! The ledger is a plain read-then-write against the store, not routed
//! through a per-key lock: two concurrent `consume` calls for the same
//! identity and action can both read the pre-increment count and both
//! succeed, losing one update. Callers needing hard guarantees must front
//! the ledger with their own serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::store::{self, keys, KvStore};

/// One counter advance inside a consume batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageIncrement {
    /// Action (or combo action) name
    pub action: String,

    /// Daily ceiling; `None` means unlimited, neither checked nor persisted
    pub limit: Option<u32>,

    /// Units to consume
    pub amount: u32,
}

/// Post-consume state of one constrained counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Action name
    pub action: String,
    /// Count after the batch applied
    pub count: u32,
    /// Daily ceiling
    pub limit: u32,
    /// Allowance left today
    pub remaining: u32,
}

/// Outcome of a consume batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Every increment fit; all were applied
    Applied(Vec<UsageRecord>),

    /// One increment would overrun; nothing was applied
    Denied {
        /// The action that failed the check
        action: String,
        /// Its count before the batch
        count: u32,
        /// Its daily ceiling
        limit: u32,
        /// Allowance left today
        remaining: u32,
    },
}

impl ConsumeOutcome {
    /// Whether the batch applied
    pub fn is_applied(&self) -> bool {
        matches!(self, ConsumeOutcome::Applied(_))
    }
}

/// Read-only view of one counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Count so far today
    pub count: u32,
    /// Daily ceiling, `None` when unlimited
    pub limit: Option<u32>,
    /// Allowance left today, `None` when unlimited
    pub remaining: Option<u32>,
}

/// Persisted daily counter; a stale `date_key` reads as absent
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsageCounterRecord {
    count: u32,
    date_key: String,
    updated_at: DateTime<Utc>,
}

/// Daily usage ledger over the shared store
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn KvStore>,
    retention: Duration,
}

impl UsageLedger {
    /// Create a ledger over the given store
    pub fn new(store: Arc<dyn KvStore>, config: &GovernanceConfig) -> Self {
        Self {
            store,
            retention: config.usage_retention(),
        }
    }

    /// Consume a batch of increments for today, all or nothing
    pub async fn consume(
        &self,
        identity: &str,
        increments: &[UsageIncrement],
    ) -> Result<ConsumeOutcome, GovernanceError> {
        self.consume_at(identity, increments, Utc::now()).await
    }

    /// Clock-explicit [`consume`](Self::consume)
    pub async fn consume_at(
        &self,
        identity: &str,
        increments: &[UsageIncrement],
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, GovernanceError> {
        validate_batch(identity, increments)?;

        let day = keys::day_key(now);

        // Phase 1: read every constrained counter and check the whole batch
        let mut staged: Vec<(&UsageIncrement, u32, u32)> = Vec::new();
        for increment in increments {
            let Some(limit) = increment.limit else {
                continue; // unlimited: not checked, not persisted
            };
            let count = self.current_count(identity, &increment.action, &day).await?;
            let next = count.saturating_add(increment.amount);
            if next > limit {
                info!(
                    identity,
                    action = %increment.action,
                    count,
                    limit,
                    "quota batch denied"
                );
                // saturating: a mid-day plan downgrade can leave count over
                // the new limit
                return Ok(ConsumeOutcome::Denied {
                    action: increment.action.clone(),
                    count,
                    limit,
                    remaining: limit.saturating_sub(count),
                });
            }
            staged.push((increment, next, limit));
        }

        // Phase 2: every increment fits, persist them all
        let mut records = Vec::with_capacity(staged.len());
        for (increment, next, limit) in staged {
            let record = UsageCounterRecord {
                count: next,
                date_key: day.clone(),
                updated_at: now,
            };
            let key = keys::usage_counter(identity, &increment.action);
            store::put_json(self.store.as_ref(), &key, &record, Some(self.retention)).await?;
            records.push(UsageRecord {
                action: increment.action.clone(),
                count: next,
                limit,
                remaining: limit.saturating_sub(next),
            });
        }

        debug!(identity, applied = records.len(), "quota batch applied");
        Ok(ConsumeOutcome::Applied(records))
    }

    /// Read one counter without mutating it
    pub async fn snapshot(
        &self,
        identity: &str,
        action: &str,
        limit: Option<u32>,
    ) -> Result<UsageSnapshot, GovernanceError> {
        self.snapshot_at(identity, action, limit, Utc::now()).await
    }

    /// Clock-explicit [`snapshot`](Self::snapshot)
    pub async fn snapshot_at(
        &self,
        identity: &str,
        action: &str,
        limit: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<UsageSnapshot, GovernanceError> {
        if identity.is_empty() || action.is_empty() {
            return Err(GovernanceError::MalformedRequest(
                "identity and action are required".into(),
            ));
        }
        let day = keys::day_key(now);
        let count = self.current_count(identity, action, &day).await?;
        Ok(UsageSnapshot {
            count,
            limit,
            remaining: limit.map(|l| l.saturating_sub(count)),
        })
    }

    /// Today's count for one action; stale day keys read as zero
    async fn current_count(
        &self,
        identity: &str,
        action: &str,
        day: &str,
    ) -> Result<u32, GovernanceError> {
        let key = keys::usage_counter(identity, action);
        let record: Option<UsageCounterRecord> =
            store::get_json(self.store.as_ref(), &key).await?;
        Ok(match record {
            Some(r) if r.date_key == day => r.count,
            _ => 0,
        })
    }
}

fn validate_batch(identity: &str, increments: &[UsageIncrement]) -> Result<(), GovernanceError> {
    if identity.is_empty() {
        return Err(GovernanceError::MalformedRequest("empty identity".into()));
    }
    let mut seen = HashSet::new();
    for increment in increments {
        if increment.action.is_empty() {
            return Err(GovernanceError::MalformedRequest("empty action name".into()));
        }
        if increment.amount == 0 {
            return Err(GovernanceError::MalformedRequest(format!(
                "zero amount for action {}",
                increment.action
            )));
        }
        // A duplicate action would check twice against the same base count
        if !seen.insert(increment.action.as_str()) {
            return Err(GovernanceError::MalformedRequest(format!(
                "duplicate action in batch: {}",
                increment.action
            )));
        }
    }
    Ok(())
}
