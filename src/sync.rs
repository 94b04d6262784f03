//! Per-Key Serialization
//!
//! The store offers no cross-request coordination, so every component that
//! must read-decide-write atomically for one key routes through a
//! [`KeyLocks`] registry: one async mutex per logical key, operations on
//! different keys fully independent. Locks are never held across anything
//! but the single read/mutate/persist step.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registry of per-key async mutexes
///
/// Serializes mutation within one process. If the store is shared across
/// processes, pair this with a conditional write at the backend to catch
/// lost races; the in-process lock alone is the baseline guarantee.
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutex guarding `key`
    pub async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of keys with a registered lock
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no key has a registered lock
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
