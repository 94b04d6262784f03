//! In-Process Rate-Limit Fallback
//!
//! Used when no store-backed actor is available. Drives the identical
//! state machine as [`super::actor::RateLimitActor`] over a map owned by
//! this process, keyed by client address.
//!
//! Weaker guarantee: correctness holds only within a single process.
//! Deployments running several replicas each count independently, so a
//! client can reach `limit` on every replica before being blocked. State
//! is created at process start, never persisted, and lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::error::GovernanceError;

use super::bucket::{step, CounterBucket, RateDecision, RateRequest};

/// Process-scoped rate limiter keyed by client address
#[derive(Debug, Clone, Default)]
pub struct ProcessRateLimiter {
    buckets: Arc<Mutex<HashMap<String, CounterBucket>>>,
}

impl ProcessRateLimiter {
    /// Create an empty limiter; one per process, at startup
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one rate-limit check for `address`
    pub fn apply(
        &self,
        address: &str,
        request: RateRequest,
    ) -> Result<RateDecision, GovernanceError> {
        if address.is_empty() {
            return Err(GovernanceError::MalformedRequest(
                "empty client address".into(),
            ));
        }
        if request.limit == 0 || request.window_ms <= 0 || request.block_ms <= 0 {
            return Err(GovernanceError::MalformedRequest(
                "limit, window and block must be positive".into(),
            ));
        }

        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = buckets.get(address).cloned();
        let (next, decision) = step(current, &request);
        buckets.insert(address.to_string(), next);

        if decision.limited {
            warn!(address, "rate limit tripped (process-local)");
        }
        Ok(decision)
    }

    /// Number of addresses currently tracked
    pub fn tracked(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(limit: u32, now: i64) -> RateRequest {
        RateRequest {
            limit,
            window_ms: 60_000,
            block_ms: 120_000,
            now,
        }
    }

    #[test]
    fn test_same_policy_as_actor() {
        let limiter = ProcessRateLimiter::new();

        for now in 0..3 {
            assert!(!limiter.apply("10.0.0.1", req(3, now)).unwrap().limited);
        }
        let decision = limiter.apply("10.0.0.1", req(3, 3)).unwrap();
        assert!(decision.limited);
        assert_eq!(decision.retry_after_secs, Some(120));
    }

    #[test]
    fn test_addresses_independent() {
        let limiter = ProcessRateLimiter::new();

        for now in 0..4 {
            limiter.apply("10.0.0.1", req(3, now)).unwrap();
        }
        assert!(!limiter.apply("10.0.0.2", req(3, 5)).unwrap().limited);
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_state_lost_with_instance() {
        let limiter = ProcessRateLimiter::new();
        for now in 0..4 {
            limiter.apply("10.0.0.1", req(3, now)).unwrap();
        }

        // A fresh instance (new process) has no memory of the block
        let restarted = ProcessRateLimiter::new();
        assert!(!restarted.apply("10.0.0.1", req(3, 5)).unwrap().limited);
    }

    #[test]
    fn test_malformed_rejected() {
        let limiter = ProcessRateLimiter::new();
        assert!(limiter.apply("", req(3, 0)).is_err());
        assert!(limiter.apply("10.0.0.1", req(0, 0)).is_err());
    }
}
