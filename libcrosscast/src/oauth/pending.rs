//! Pending authorization registry
//!
//! Tracks request tokens (OAuth1.0a) and CSRF `state` values (OAuth2)
//! between the authorize redirect and the provider callback. Entries are
//! single-use and expire after a bounded TTL, so an unredeemed handoff can
//! never be replayed later.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Default time a pending authorization stays redeemable.
pub const DEFAULT_TTL_SECONDS: i64 = 600;

/// A freshly minted request token or `state` value awaiting its callback.
#[derive(Clone, Debug)]
pub struct PendingAuthorization {
    /// Provider the handoff belongs to (e.g. "twitter", "threads").
    pub provider: String,
    /// Token secret for OAuth1.0a request tokens; `None` for OAuth2 state.
    pub secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// In-memory store of outstanding authorizations.
#[derive(Clone)]
pub struct PendingStore {
    entries: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Remember a token/state value issued to the user agent.
    pub fn issue(&self, key: &str, provider: &str, secret: Option<String>) {
        let entry = PendingAuthorization {
            provider: provider.to_string(),
            secret,
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().insert(key.to_string(), entry);
    }

    /// Redeem an outstanding authorization, exactly once.
    ///
    /// Returns `None` for unknown, already-consumed, or expired keys; the
    /// entry is removed either way.
    pub fn consume(&self, key: &str) -> Option<PendingAuthorization> {
        let entry = self.entries.lock().unwrap().remove(key)?;
        if Utc::now() - entry.created_at > self.ttl {
            return None;
        }
        Some(entry)
    }

    /// Drop expired entries. Called periodically by [`run_eviction`].
    pub fn evict_expired(&self) {
        let now = Utc::now();
        self.entries
            .lock()
            .unwrap()
            .retain(|_, entry| now - entry.created_at <= self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECONDS)
    }
}

/// Background task evicting expired pending authorizations.
pub async fn run_eviction(store: PendingStore, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.evict_expired();
        tracing::debug!(outstanding = store.len(), "pending authorization eviction pass");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_consume() {
        let store = PendingStore::new(600);
        store.issue("token-1", "twitter", Some("secret-1".to_string()));

        let entry = store.consume("token-1").unwrap();
        assert_eq!(entry.provider, "twitter");
        assert_eq!(entry.secret.as_deref(), Some("secret-1"));
    }

    #[test]
    fn test_consume_is_single_use() {
        let store = PendingStore::new(600);
        store.issue("state-1", "threads", None);

        assert!(store.consume("state-1").is_some());
        assert!(store.consume("state-1").is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let store = PendingStore::new(600);
        assert!(store.consume("never-issued").is_none());
    }

    #[test]
    fn test_expired_entry_rejected() {
        let store = PendingStore::new(0);
        store.issue("state-2", "linkedin", None);

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(store.consume("state-2").is_none());
    }

    #[test]
    fn test_eviction_removes_expired() {
        let store = PendingStore::new(0);
        store.issue("a", "twitter", None);
        store.issue("b", "threads", None);
        assert_eq!(store.len(), 2);

        std::thread::sleep(std::time::Duration::from_millis(1100));
        store.evict_expired();
        assert!(store.is_empty());
    }
}
