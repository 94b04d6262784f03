//! ExamGate Usage-Governance Library
//!
//! This library provides the usage-governance subsystem of the ExamGate
//! exam-practice platform: everything where correctness depends on ordering,
//! concurrency, or numeric policy rather than plain field mapping.
//!
//! # Components
//!
//! - [`rate_limit`] - fixed-window rate limiting with per-key serialized
//!   mutation (plus a weaker in-process fallback)
//! - [`session`] - concurrent-session cap and rotation per identity
//! - [`quota`] - per-plan daily usage counters with all-or-nothing combo
//!   batches
//! - [`challenge`] - adaptive re-serving of previously missed questions
//! - [`gate`] - the inbound facade wiring rate -> session -> quota checks
//!
//! Rendering, question-bank storage, payments, and JWT verification live
//! outside this crate; it consumes a verified [`quota::Identity`] and a
//! [`store::KvStore`] and emits structured allow/deny decisions.

pub mod challenge;
pub mod config;
pub mod error;
pub mod gate;
pub mod quota;
pub mod rate_limit;
pub mod session;
pub mod store;
pub mod sync;

pub use config::GovernanceConfig;
pub use error::{GovernanceError, StoreError};
pub use gate::{Gate, GateDecision};
