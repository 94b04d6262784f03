//! Governance Gate
//!
//! The inbound seam for the route layer. A governed action passes rate
//! limiting, then session validation, then quota consumption, in that
//! order; the first failing stage produces a structured denial and later
//! stages are not run. Content selection and mutation happen only behind
//! an `Allowed` decision.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::challenge::{ChallengeSelector, QuestionSource};
use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::quota::{ConsumeOutcome, Identity, UsageIncrement, UsageLedger, UsageRecord};
use crate::rate_limit::{RateLimitActor, RateRequest};
use crate::session::{SessionMeta, SessionRegistry};
use crate::store::KvStore;

/// One governed inbound action
#[derive(Debug, Clone)]
pub struct GovernedRequest {
    /// Verified identity of the caller
    pub identity: Identity,

    /// Session id named by the caller's credential
    pub session_id: String,

    /// Client address, used as the rate-limit key
    pub client_address: String,

    /// Optional client metadata forwarded to the session registry
    pub meta: SessionMeta,

    /// Quota increments this action consumes
    pub increments: Vec<UsageIncrement>,
}

/// Decision for one governed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// All stages passed; constrained counters after the consume
    Allowed(Vec<UsageRecord>),

    /// Rate limit tripped; retry after the given delay
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// Credential names an evicted or expired session; re-authenticate
    SessionNotFound,

    /// A daily ceiling was reached
    QuotaExceeded {
        /// The exceeded action
        action: String,
        /// Its count today
        count: u32,
        /// Its daily ceiling
        limit: u32,
        /// Allowance left today
        remaining: u32,
    },
}

/// Governance pipeline facade
#[derive(Clone)]
pub struct Gate {
    config: GovernanceConfig,
    rate: RateLimitActor,
    sessions: SessionRegistry,
    usage: UsageLedger,
    challenges: ChallengeSelector,
}

impl Gate {
    /// Wire all four components over one store
    pub fn new(
        store: Arc<dyn KvStore>,
        source: Arc<dyn QuestionSource>,
        config: GovernanceConfig,
    ) -> Self {
        Self {
            rate: RateLimitActor::new(store.clone(), &config),
            sessions: SessionRegistry::new(store.clone(), &config),
            usage: UsageLedger::new(store.clone(), &config),
            challenges: ChallengeSelector::new(store, source, &config),
            config,
        }
    }

    /// Run the full pipeline for one governed action
    pub async fn check(&self, request: &GovernedRequest) -> Result<GateDecision, GovernanceError> {
        let now = Utc::now();

        let rate_decision = self
            .rate
            .apply(
                &request.client_address,
                RateRequest {
                    limit: self.config.rate_limit,
                    window_ms: self.config.rate_window_ms,
                    block_ms: self.config.rate_block_ms,
                    now: now.timestamp_millis(),
                },
            )
            .await?;
        if rate_decision.limited {
            return Ok(GateDecision::RateLimited {
                retry_after_secs: rate_decision.retry_after_secs.unwrap_or(0),
            });
        }

        let found = self
            .sessions
            .touch(&request.identity.id, &request.session_id, request.meta.clone())
            .await?;
        if !found {
            return Ok(GateDecision::SessionNotFound);
        }

        match self
            .usage
            .consume(&request.identity.id, &request.increments)
            .await?
        {
            ConsumeOutcome::Applied(records) => {
                debug!(identity = %request.identity.id, "governed action allowed");
                Ok(GateDecision::Allowed(records))
            }
            ConsumeOutcome::Denied {
                action,
                count,
                limit,
                remaining,
            } => Ok(GateDecision::QuotaExceeded {
                action,
                count,
                limit,
                remaining,
            }),
        }
    }

    /// Rate-limit component
    pub fn rate(&self) -> &RateLimitActor {
        &self.rate
    }

    /// Session registry component
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Usage ledger component
    pub fn usage(&self) -> &UsageLedger {
        &self.usage
    }

    /// Challenge selector component
    pub fn challenges(&self) -> &ChallengeSelector {
        &self.challenges
    }

    /// Configuration in effect
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }
}
