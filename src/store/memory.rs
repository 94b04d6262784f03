//! In-Memory Store
//!
//! Store backend over a process-local ordered map. Expiry is lazy: an entry
//! past its deadline is dropped the next time a read touches it, never by a
//! background task. Used as the test backend and for single-process
//! deployments.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::{KvStore, ListPage};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory key-value store with lazy TTL expiry
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the store holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        // Expired: drop it under the write lock, re-checking first
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        let start = cursor.unwrap_or(prefix);
        let mut keys = Vec::new();
        let mut next = None;

        for (key, entry) in entries.range(start.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if entry.is_expired(now) {
                continue;
            }
            if keys.len() == limit {
                next = Some(key.clone());
                break;
            }
            keys.push(key.clone());
        }

        Ok(ListPage { keys, cursor: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("k1", "v1", None).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v1".to_string()));

        store.delete("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_lazy_expiry() {
        let store = MemoryStore::new();
        store
            .put("short", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let store = MemoryStore::new();
        store.put("a:1", "x", None).await.unwrap();
        store.put("a:2", "x", None).await.unwrap();
        store.put("b:1", "x", None).await.unwrap();

        let page = store.list("a:", 10, None).await.unwrap();
        assert_eq!(page.keys, vec!["a:1", "a:2"]);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.put(&format!("p:{i}"), "x", None).await.unwrap();
        }

        let first = store.list("p:", 2, None).await.unwrap();
        assert_eq!(first.keys, vec!["p:0", "p:1"]);
        let cursor = first.cursor.clone().unwrap();

        let second = store.list("p:", 2, Some(&cursor)).await.unwrap();
        assert_eq!(second.keys, vec!["p:2", "p:3"]);

        let third = store
            .list("p:", 2, second.cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(third.keys, vec!["p:4"]);
        assert!(third.cursor.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_skipped_in_list() {
        let store = MemoryStore::new();
        store.put("e:1", "x", Some(Duration::ZERO)).await.unwrap();
        store.put("e:2", "x", None).await.unwrap();

        let page = store.list("e:", 10, None).await.unwrap();
        assert_eq!(page.keys, vec!["e:2"]);
    }
}
