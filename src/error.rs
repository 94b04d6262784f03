//! Governance Error Types
//!
//! Only two things are hard failures in this subsystem: a request that is
//! structurally invalid, and a store access that failed. Every policy
//! decision (rate limited, quota exceeded, session missing, no challenge
//! candidate) is a structured outcome value on the success path, so callers
//! can always render an actionable message.

/// Error types for governance operations
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Required field missing or invalid; nothing was mutated
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Store access failed; not retried internally, caller decides
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Error types for the key-value store collaborator
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend read/write failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Stored value could not be decoded
    #[error("Corrupt value at key {key}: {reason}")]
    CorruptValue {
        /// Key whose value failed to decode
        key: String,
        /// Decode failure detail
        reason: String,
    },
}

impl StoreError {
    /// Wrap a serde decode failure for the given key
    pub fn corrupt(key: &str, err: serde_json::Error) -> Self {
        StoreError::CorruptValue {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}
