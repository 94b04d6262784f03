//! Rate Limiting Module
//!
//! Fixed-window rate limiting with a hard block once the window limit is
//! exceeded. Two front ends drive one state machine:
//!
//! - [`RateLimitActor`] - store-backed, every mutation of a key serialized
//!   through a per-key lock; the deployment default
//! - [`ProcessRateLimiter`] - in-process map fallback, correct only within
//!   a single process
//!
//! Expiry of windows and blocks is lazy: state is re-evaluated on the next
//! check, never swept by a background task.

pub mod actor;
pub mod bucket;
pub mod fallback;

pub use actor::RateLimitActor;
pub use bucket::{CounterBucket, RateDecision, RateRequest};
pub use fallback::ProcessRateLimiter;
