//! In-process TTL cache for catalog reads.
//!
//! Entries are keyed by the validated query that produced them and stored as
//! JSON so any response payload can be cached. Writes that can change what the
//! storefront shows call [`CatalogCache::invalidate_prefix`].

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::RwLock;

/// Prefix shared by every storefront key.
pub const SHOP_PREFIX: &str = "shop:";

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Clone)]
pub struct CatalogCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl CatalogCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.is_enabled() {
            return None;
        }
        let entry = {
            let store = self.store.read().await;
            store.get(key).cloned()
        }?;
        if entry.is_expired() {
            self.store.write().await.remove(key);
            return None;
        }
        serde_json::from_value(entry.value).ok()
    }

    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        if !self.is_enabled() {
            return;
        }
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "catalog cache serialization failed");
                return;
            }
        };
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        let mut store = self.store.write().await;
        store.retain(|_, e| !e.is_expired());
        store.insert(key.into(), entry);
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        let dropped = before - store.len();
        if dropped > 0 {
            tracing::debug!(prefix, dropped, "catalog cache invalidated");
        }
    }

    /// Drop every storefront entry.
    pub async fn invalidate_shop(&self) {
        self.invalidate_prefix(SHOP_PREFIX).await;
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}
