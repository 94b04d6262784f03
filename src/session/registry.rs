//! Session Concurrency Registry
//!
//! Tracks the active sessions of each identity as one ordered list in the
//! store. Registration is a serialized step per identity, so two
//! concurrent logins cannot both slip under the cap. Eviction is strictly
//! FIFO by creation time - predictability over "keep most active".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::store::{self, keys, KvStore};
use crate::sync::KeyLocks;

/// One active session of an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session id (issued at authentication)
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Last validated request, refreshed at most once per touch interval
    pub last_seen_at: DateTime<Utc>,

    /// Client address of the last validated request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    /// User agent of the last validated request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Optional client metadata carried on register/touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMeta {
    /// Client address
    pub source_address: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
}

/// Generate a fresh session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-identity session registry over the shared store
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KvStore>,
    locks: KeyLocks,
    max_sessions: usize,
    touch_interval: Duration,
    retention: Duration,
}

impl SessionRegistry {
    /// Create a registry over the given store
    pub fn new(store: Arc<dyn KvStore>, config: &GovernanceConfig) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
            max_sessions: config.session_max,
            touch_interval: Duration::seconds(config.touch_interval_secs),
            retention: Duration::days(config.session_retention_days),
        }
    }

    /// Register a session, evicting the oldest beyond the cap
    pub async fn register(
        &self,
        identity: &str,
        session_id: &str,
        meta: SessionMeta,
    ) -> Result<(), GovernanceError> {
        self.register_at(identity, session_id, meta, Utc::now()).await
    }

    /// Clock-explicit [`register`](Self::register)
    pub async fn register_at(
        &self,
        identity: &str,
        session_id: &str,
        meta: SessionMeta,
        now: DateTime<Utc>,
    ) -> Result<(), GovernanceError> {
        validate_ids(identity, session_id)?;

        let lock = self.locks.lock_for(identity).await;
        let _guard = lock.lock().await;

        let mut sessions = self.load(identity, now).await?;

        // Re-registering an id replaces the old entry outright
        sessions.retain(|s| s.id != session_id);
        sessions.push(StoredSession {
            id: session_id.to_string(),
            created_at: now,
            last_seen_at: now,
            source_address: meta.source_address,
            user_agent: meta.user_agent,
        });
        sessions.sort_by_key(|s| s.created_at);

        while sessions.len() > self.max_sessions {
            let evicted = sessions.remove(0);
            info!(identity, session = %evicted.id, "evicted oldest session over cap");
        }

        self.persist(identity, &sessions).await?;
        debug!(identity, session = session_id, active = sessions.len(), "session registered");
        Ok(())
    }

    /// Validate a session and refresh its liveness metadata
    ///
    /// Returns `false` when the id is not in the live list - the caller's
    /// credential refers to an evicted or expired session and must be
    /// treated as unauthenticated.
    pub async fn touch(
        &self,
        identity: &str,
        session_id: &str,
        meta: SessionMeta,
    ) -> Result<bool, GovernanceError> {
        self.touch_at(identity, session_id, meta, Utc::now()).await
    }

    /// Clock-explicit [`touch`](Self::touch)
    pub async fn touch_at(
        &self,
        identity: &str,
        session_id: &str,
        meta: SessionMeta,
        now: DateTime<Utc>,
    ) -> Result<bool, GovernanceError> {
        validate_ids(identity, session_id)?;

        let lock = self.locks.lock_for(identity).await;
        let _guard = lock.lock().await;

        let mut sessions = self.load(identity, now).await?;
        let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) else {
            debug!(identity, session = session_id, "touch on unknown session");
            return Ok(false);
        };

        let mut changed = false;
        if now - session.last_seen_at >= self.touch_interval {
            session.last_seen_at = now;
            changed = true;
        }
        if meta.source_address.is_some() && session.source_address != meta.source_address {
            session.source_address = meta.source_address;
            changed = true;
        }
        if meta.user_agent.is_some() && session.user_agent != meta.user_agent {
            session.user_agent = meta.user_agent;
            changed = true;
        }

        if changed {
            self.persist(identity, &sessions).await?;
        }
        Ok(true)
    }

    /// Remove one session; no-op if absent
    pub async fn revoke(&self, identity: &str, session_id: &str) -> Result<(), GovernanceError> {
        validate_ids(identity, session_id)?;

        let lock = self.locks.lock_for(identity).await;
        let _guard = lock.lock().await;

        let mut sessions = self.load(identity, Utc::now()).await?;
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);

        if sessions.len() != before {
            self.persist(identity, &sessions).await?;
            debug!(identity, session = session_id, "session revoked");
        }
        Ok(())
    }

    /// Remove every session of an identity (logout everywhere)
    pub async fn revoke_all(&self, identity: &str) -> Result<(), GovernanceError> {
        if identity.is_empty() {
            return Err(GovernanceError::MalformedRequest("empty identity".into()));
        }
        let lock = self.locks.lock_for(identity).await;
        let _guard = lock.lock().await;

        self.store.delete(&keys::session_list(identity)).await?;
        info!(identity, "all sessions revoked");
        Ok(())
    }

    /// Read-only view of the live sessions, oldest first
    pub async fn sessions(&self, identity: &str) -> Result<Vec<StoredSession>, GovernanceError> {
        if identity.is_empty() {
            return Err(GovernanceError::MalformedRequest("empty identity".into()));
        }
        self.load(identity, Utc::now()).await
    }

    /// Load the list, purging entries past the retention horizon
    async fn load(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredSession>, GovernanceError> {
        let key = keys::session_list(identity);
        let sessions: Vec<StoredSession> = store::get_json(self.store.as_ref(), &key)
            .await?
            .unwrap_or_default();

        let horizon = now - self.retention;
        Ok(sessions
            .into_iter()
            .filter(|s| s.created_at > horizon)
            .collect())
    }

    async fn persist(
        &self,
        identity: &str,
        sessions: &[StoredSession],
    ) -> Result<(), GovernanceError> {
        let key = keys::session_list(identity);
        let ttl = self.retention.to_std().ok();
        store::put_json(self.store.as_ref(), &key, &sessions, ttl).await?;
        Ok(())
    }
}

fn validate_ids(identity: &str, session_id: &str) -> Result<(), GovernanceError> {
    if identity.is_empty() {
        return Err(GovernanceError::MalformedRequest("empty identity".into()));
    }
    if session_id.is_empty() {
        return Err(GovernanceError::MalformedRequest("empty session id".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryStore::new()), &GovernanceConfig::default())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        // Anchor to the wall clock: `sessions()` purges against the real
        // retention horizon, so a fixed base would rot as time passes.
        static BASE: std::sync::OnceLock<i64> = std::sync::OnceLock::new();
        let base = *BASE.get_or_init(|| Utc::now().timestamp());
        Utc.timestamp_opt(base + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_register_caps_fifo() {
        let registry = registry();

        registry
            .register_at("u@example.com", "A", SessionMeta::default(), at(0))
            .await
            .unwrap();
        registry
            .register_at("u@example.com", "B", SessionMeta::default(), at(10))
            .await
            .unwrap();
        registry
            .register_at("u@example.com", "C", SessionMeta::default(), at(20))
            .await
            .unwrap();

        let sessions = registry.sessions("u@example.com").await.unwrap();
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_reregister_same_id_no_duplicate() {
        let registry = registry();

        registry
            .register_at("u", "A", SessionMeta::default(), at(0))
            .await
            .unwrap();
        registry
            .register_at("u", "A", SessionMeta::default(), at(5))
            .await
            .unwrap();

        let sessions = registry.sessions("u").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].created_at, at(5));
    }

    #[tokio::test]
    async fn test_touch_known_and_unknown() {
        let registry = registry();
        registry
            .register_at("u", "A", SessionMeta::default(), at(0))
            .await
            .unwrap();

        assert!(registry
            .touch_at("u", "A", SessionMeta::default(), at(1))
            .await
            .unwrap());
        assert!(!registry
            .touch_at("u", "gone", SessionMeta::default(), at(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_touch_refresh_throttled() {
        let registry = registry();
        registry
            .register_at("u", "A", SessionMeta::default(), at(0))
            .await
            .unwrap();

        // Within the interval: last_seen_at stays put
        registry
            .touch_at("u", "A", SessionMeta::default(), at(30))
            .await
            .unwrap();
        assert_eq!(registry.sessions("u").await.unwrap()[0].last_seen_at, at(0));

        // Interval elapsed: refreshed
        registry
            .touch_at("u", "A", SessionMeta::default(), at(60))
            .await
            .unwrap();
        assert_eq!(registry.sessions("u").await.unwrap()[0].last_seen_at, at(60));
    }

    #[tokio::test]
    async fn test_touch_updates_changed_meta() {
        let registry = registry();
        let meta = SessionMeta {
            source_address: Some("1.1.1.1".into()),
            user_agent: Some("ua-1".into()),
        };
        registry.register_at("u", "A", meta, at(0)).await.unwrap();

        let moved = SessionMeta {
            source_address: Some("2.2.2.2".into()),
            user_agent: None,
        };
        registry.touch_at("u", "A", moved, at(5)).await.unwrap();

        let session = &registry.sessions("u").await.unwrap()[0];
        assert_eq!(session.source_address.as_deref(), Some("2.2.2.2"));
        assert_eq!(session.user_agent.as_deref(), Some("ua-1"));
    }

    #[tokio::test]
    async fn test_revoke() {
        let registry = registry();
        registry
            .register_at("u", "A", SessionMeta::default(), at(0))
            .await
            .unwrap();
        registry
            .register_at("u", "B", SessionMeta::default(), at(1))
            .await
            .unwrap();

        registry.revoke("u", "A").await.unwrap();
        let ids: Vec<_> = registry
            .sessions("u")
            .await
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids, vec!["B"]);

        // Revoking again is a no-op
        registry.revoke("u", "A").await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let registry = registry();
        registry
            .register_at("u", "A", SessionMeta::default(), at(0))
            .await
            .unwrap();
        registry.revoke_all("u").await.unwrap();
        assert!(registry.sessions("u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_horizon_purges_on_read() {
        let registry = registry();
        registry
            .register_at("u", "old", SessionMeta::default(), at(0))
            .await
            .unwrap();

        // 31 days later the session is past the 30-day horizon
        let later = at(31 * 24 * 3600);
        assert!(!registry
            .touch_at("u", "old", SessionMeta::default(), later)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_registers_respect_cap() {
        let registry = registry();

        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .register_at(
                        "u",
                        &format!("s{i}"),
                        SessionMeta::default(),
                        at(i),
                    )
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let sessions = registry.sessions("u").await.unwrap();
        assert!(sessions.len() <= 2);
    }

    #[test]
    fn test_new_session_ids_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }

    #[tokio::test]
    async fn test_empty_ids_rejected() {
        let registry = registry();
        assert!(registry
            .register("", "A", SessionMeta::default())
            .await
            .is_err());
        assert!(registry.touch("u", "", SessionMeta::default()).await.is_err());
    }
}
