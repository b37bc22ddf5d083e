//! Result cache keyed by (category, symbol, params).
//!
//! Entries are stored as JSON next to their expiry time, so expiry holds
//! even on a backend that keeps entries longer than asked. Any backend or
//! serialization error is logged and treated as a miss.

mod backend;

pub use backend::{CacheBackend, MokaCacheBackend};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::Category;

/// Tag reported as the source of a cache hit.
pub const CACHE_SOURCE: &str = "cache";

/// Build the cache key for a request.
///
/// `quote:bitcoin`, `history:bitcoin:days=30`.
pub fn cache_key(category: Category, symbol: &str, params: Option<&str>) -> String {
    match params {
        Some(params) if !params.is_empty() => {
            format!("{}:{}:{}", category.as_str(), symbol.trim(), params)
        }
        _ => format!("{}:{}", category.as_str(), symbol.trim()),
    }
}

/// Stored form of a cached value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Typed view over a [`CacheBackend`].
#[derive(Clone)]
pub struct MarketDataCache {
    backend: Arc<dyn CacheBackend>,
}

impl MarketDataCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Cache on a fresh in-process moka backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MokaCacheBackend::new()))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for '{}', treating as miss: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable cache entry '{}': {}", key, e);
                self.remove(key).await;
                return None;
            }
        };

        if entry.is_expired(Utc::now()) {
            debug!("Cache entry '{}' expired", key);
            self.remove(key).await;
            return None;
        }

        Some(entry.value)
    }

    /// Write `value` under `key` for `ttl`. Failures are logged only.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let ttl_chrono =
            chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500));
        let expires_at = Utc::now() + ttl_chrono;

        let raw = match serde_json::to_string(&CacheEntry { value, expires_at }) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache entry '{}': {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.set_with_ttl(key, raw, ttl).await {
            warn!("Cache write failed for '{}': {}", key, e);
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key).await {
            warn!("Cache remove failed for '{}': {}", key, e);
        }
    }

    /// Drop every cached entry for `symbol` in `category`, whatever the params.
    pub async fn invalidate_symbol(&self, category: Category, symbol: &str) {
        let key = cache_key(category, symbol, None);
        self.remove(&key).await;

        let prefix = format!("{}:", key);
        if let Err(e) = self.backend.remove_prefix(&prefix).await {
            warn!("Cache prefix removal failed for '{}': {}", prefix, e);
        }
    }
}
