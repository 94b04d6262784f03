//! Key-Value Store Port
//!
//! The store is the only external collaborator of the governance subsystem.
//! It is assumed linearizable per key with optional expiry, and offers no
//! cross-key transactions; every atomicity guarantee above single-key
//! put/get is built in the modules that use it.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

pub mod keys;
pub mod memory;

pub use memory::MemoryStore;

/// One page of a prefix listing
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Keys in ascending order
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` when the listing is complete
    pub cursor: Option<String>,
}

/// Key-value store abstraction
///
/// Values are JSON strings; callers own encoding and decoding. `ttl` is a
/// hint to the backend - entries may outlive it, so readers must still
/// validate freshness themselves (day keys, retention horizons).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value at `key`, `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` at `key`, optionally expiring after `ttl`
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete the entry at `key`; no-op if absent
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List up to `limit` keys starting with `prefix`, resuming from `cursor`
    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ListPage, StoreError>;
}

/// Read and decode a JSON value, treating a decode failure as corrupt data
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::corrupt(key, e)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub(crate) async fn put_json<T: serde::Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Backend(e.to_string()))?;
    store.put(key, &raw, ttl).await
}
