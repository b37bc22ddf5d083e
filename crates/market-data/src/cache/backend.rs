//! Cache storage backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use crate::errors::MarketDataError;

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Key/value store with per-entry expiry.
///
/// Values are opaque serialized strings. Callers treat every error as a
/// miss, so a backend is free to fail.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, MarketDataError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), MarketDataError>;

    async fn remove(&self, key: &str) -> Result<(), MarketDataError>;

    /// Remove every key starting with `prefix`.
    async fn remove_prefix(&self, prefix: &str) -> Result<(), MarketDataError>;
}

#[derive(Clone, Debug)]
struct TtlValue {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, TtlValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &TtlValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &TtlValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend on a moka future cache.
pub struct MokaCacheBackend {
    cache: Cache<String, TtlValue>,
}

impl MokaCacheBackend {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .support_invalidation_closures()
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MokaCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MokaCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, MarketDataError> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), MarketDataError> {
        self.cache
            .insert(key.to_string(), TtlValue { value, ttl })
            .await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MarketDataError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), MarketDataError> {
        let prefix = prefix.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map_err(|e| MarketDataError::Store(format!("cache invalidation: {}", e)))?;
        Ok(())
    }
}
