//! Serialized Rate-Limit Actor
//!
//! Store-backed rate limiting where every mutation of one key runs as a
//! single uninterruptible step: acquire the key's lock, read the bucket,
//! drive the state machine, persist, release. Concurrent checks for the
//! same key therefore observe each other's increments; checks for
//! different keys proceed in parallel.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::store::{self, keys, KvStore};
use crate::sync::KeyLocks;

use super::bucket::{step, CounterBucket, RateDecision, RateRequest};

/// Per-key serialized rate limiter over the shared store
#[derive(Clone)]
pub struct RateLimitActor {
    store: Arc<dyn KvStore>,
    locks: KeyLocks,
    bucket_ttl: Duration,
}

impl RateLimitActor {
    /// Create an actor over the given store
    pub fn new(store: Arc<dyn KvStore>, config: &GovernanceConfig) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
            bucket_ttl: config.bucket_retention(),
        }
    }

    /// Run one rate-limit check for `key`
    ///
    /// The read-decide-write sequence holds the key's lock for its whole
    /// duration, so at most one mutation per key is in flight.
    pub async fn apply(
        &self,
        key: &str,
        request: RateRequest,
    ) -> Result<RateDecision, GovernanceError> {
        validate(key, &request)?;

        let lock = self.locks.lock_for(key).await;
        let _guard = lock.lock().await;

        let store_key = keys::rate_bucket(key);
        let current: Option<CounterBucket> = store::get_json(self.store.as_ref(), &store_key).await?;

        let (next, decision) = step(current, &request);
        store::put_json(self.store.as_ref(), &store_key, &next, Some(self.bucket_ttl)).await?;

        if decision.limited {
            warn!(
                key,
                retry_after_secs = decision.retry_after_secs,
                "rate limit tripped"
            );
        } else {
            debug!(key, count = next.count, "rate check passed");
        }

        Ok(decision)
    }
}

/// Reject structurally invalid requests before touching any state
fn validate(key: &str, request: &RateRequest) -> Result<(), GovernanceError> {
    if key.is_empty() {
        return Err(GovernanceError::MalformedRequest("empty rate key".into()));
    }
    if request.limit == 0 {
        return Err(GovernanceError::MalformedRequest(
            "rate limit must be positive".into(),
        ));
    }
    if request.window_ms <= 0 || request.block_ms <= 0 {
        return Err(GovernanceError::MalformedRequest(
            "window and block durations must be positive".into(),
        ));
    }
    Ok(())
}
