use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Provider;

/// Time-bound key/value store bridging the authorize → callback window (PKCE
/// verifiers) and the callback → fetch window (issued credentials).
///
/// Expiry is absolute from insertion, not sliding. `get` must never return a
/// value past its deadline.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn put(&self, key: String, value: String, ttl: Duration);
    async fn get(&self, key: &str) -> Option<String>;
    async fn delete(&self, key: &str);
}

/// Verifier entries are single-use and short-lived.
pub fn verifier_key(provider: Provider, state: &str) -> String {
    format!("{provider}_code_verifier:{state}")
}

pub fn credentials_key(provider: Provider, state: &str) -> String {
    format!("{provider}_credentials:{state}")
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory `TokenCache`. Clones share the same storage, so one instance
/// can serve every handler. Expired entries are dropped lazily on `get` and
/// in bulk by `purge_expired`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed. `get`
    /// already refuses expired values; this reclaims their memory.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenCache for MemoryCache {
    async fn put(&self, key: String, value: String, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Spawns a background task that sweeps expired entries on a fixed cadence.
pub fn spawn_sweeper(cache: MemoryCache, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // interval fires immediately on the first tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "purged expired cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{MemoryCache, TokenCache, credentials_key, verifier_key};
    use crate::Provider;

    #[test]
    fn keys_namespace_by_provider_and_state() {
        assert_eq!(
            verifier_key(Provider::Airtable, "st-1"),
            "airtable_code_verifier:st-1"
        );
        assert_eq!(
            credentials_key(Provider::Notion, "st-2"),
            "notion_credentials:st-2"
        );
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let cache = MemoryCache::new();
        cache
            .put("k".to_string(), "v".to_string(), Duration::from_secs(60))
            .await;

        assert_eq!(cache.get("k").await.as_deref(), Some("v"));

        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn zero_ttl_entries_are_never_readable() {
        let cache = MemoryCache::new();
        cache
            .put("k".to_string(), "v".to_string(), Duration::ZERO)
            .await;

        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .put("k".to_string(), "v".to_string(), Duration::from_millis(40))
            .await;

        assert_eq!(cache.get("k").await.as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.len().await, 0, "expired entry should be dropped");
    }

    #[tokio::test]
    async fn states_do_not_cross_contaminate() {
        let cache = MemoryCache::new();
        let first = verifier_key(Provider::Airtable, "state-a");
        let second = verifier_key(Provider::Airtable, "state-b");

        cache
            .put(first.clone(), "va".to_string(), Duration::from_secs(60))
            .await;
        cache
            .put(second.clone(), "vb".to_string(), Duration::from_secs(60))
            .await;

        cache.delete(&first).await;
        assert_eq!(cache.get(&first).await, None);
        assert_eq!(cache.get(&second).await.as_deref(), Some("vb"));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let cache = MemoryCache::new();
        cache
            .put("old".to_string(), "1".to_string(), Duration::ZERO)
            .await;
        cache
            .put("live".to_string(), "2".to_string(), Duration::from_secs(60))
            .await;

        let removed = cache.purge_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("live").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let cache = MemoryCache::new();
        let clone = cache.clone();

        cache
            .put("k".to_string(), "v".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(clone.get("k").await.as_deref(), Some("v"));

        clone.delete("k").await;
        assert!(cache.is_empty().await);
    }
}
