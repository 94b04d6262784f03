//! Fixed-Window Counter Bucket
//!
//! The rate-limit state machine, kept pure: callers supply the clock as
//! part of the request and receive the successor bucket plus the decision.
//! Both the serialized actor and the in-process fallback drive this same
//! machine, so their decisions can only differ in how they isolate the
//! bucket, never in policy.

use serde::{Deserialize, Serialize};

/// Per-key rate-limit state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterBucket {
    /// Requests counted in the current window
    pub count: u32,

    /// When the current window ends (unix epoch milliseconds)
    pub window_expires_at: i64,

    /// Active block deadline, dominating all other fields until it elapses
    pub blocked_until: Option<i64>,
}

/// One rate-limit check
#[derive(Debug, Clone, Copy)]
pub struct RateRequest {
    /// Requests allowed per window
    pub limit: u32,

    /// Window duration in milliseconds
    pub window_ms: i64,

    /// Block duration applied once the limit is exceeded, in milliseconds
    pub block_ms: i64,

    /// Caller's clock, unix epoch milliseconds
    pub now: i64,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request must be rejected
    pub limited: bool,

    /// Seconds to wait before retrying, present when limited
    pub retry_after_secs: Option<u64>,
}

impl RateDecision {
    /// An allowed decision
    pub fn allowed() -> Self {
        Self {
            limited: false,
            retry_after_secs: None,
        }
    }

    /// A limited decision with a retry delay
    pub fn limited(retry_after_secs: u64) -> Self {
        Self {
            limited: true,
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

/// Milliseconds to whole seconds, rounding up
fn ceil_secs(ms: i64) -> u64 {
    (ms.max(0) as u64).div_ceil(1000)
}

/// Advance the bucket by one request
///
/// Returns the successor bucket and the decision. Block expiry is lazy:
/// an elapsed block is simply not observed here, and the normal window
/// logic below clears it.
pub fn step(bucket: Option<CounterBucket>, req: &RateRequest) -> (CounterBucket, RateDecision) {
    if let Some(ref b) = bucket {
        if let Some(blocked_until) = b.blocked_until {
            if req.now < blocked_until {
                let decision = RateDecision::limited(ceil_secs(blocked_until - req.now));
                return (b.clone(), decision);
            }
        }
    }

    match bucket {
        Some(b) if req.now < b.window_expires_at => {
            let count = b.count.saturating_add(1);
            if count > req.limit {
                let blocked = CounterBucket {
                    count: 0,
                    window_expires_at: req.now + req.window_ms,
                    blocked_until: Some(req.now + req.block_ms),
                };
                (blocked, RateDecision::limited(ceil_secs(req.block_ms)))
            } else {
                let advanced = CounterBucket {
                    count,
                    window_expires_at: b.window_expires_at,
                    blocked_until: None,
                };
                (advanced, RateDecision::allowed())
            }
        }
        // No bucket yet, or the window (and any block) has elapsed
        _ => {
            let fresh = CounterBucket {
                count: 1,
                window_expires_at: req.now + req.window_ms,
                blocked_until: None,
            };
            (fresh, RateDecision::allowed())
        }
    }
}
