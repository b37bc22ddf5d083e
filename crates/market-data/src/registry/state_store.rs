//! Keyed state storage shared by the circuit breaker and the rate limiter.
//!
//! Both components keep one small record per provider and need an atomic
//! read-modify-write on it. The [`StateStore`] trait captures exactly that,
//! so the records can live in process memory or in a shared SQLite file.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::errors::MarketDataError;

/// Keyed store with atomic per-key updates.
///
/// `update` runs the closure exactly once while holding whatever lock or
/// transaction makes the read-modify-write atomic for that key. Setting the
/// slot to `None` removes the key. The closure must not block or await.
pub trait StateStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<V>, MarketDataError>;

    fn set(&self, key: &str, value: V) -> Result<(), MarketDataError>;

    /// Atomically transform the value under `key`, returning the new value.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&mut Option<V>),
    ) -> Result<Option<V>, MarketDataError>;

    fn remove(&self, key: &str) -> Result<(), MarketDataError>;

    /// Snapshot of every key and value.
    fn entries(&self) -> Result<Vec<(String, V)>, MarketDataError>;

    fn clear(&self) -> Result<(), MarketDataError>;
}

/// Process-local [`StateStore`] on a sharded concurrent map.
///
/// Updates hold the shard's write lock for the duration of the closure.
pub struct InMemoryStateStore<V> {
    map: DashMap<String, V>,
}

impl<V> InMemoryStateStore<V> {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<V> Default for InMemoryStateStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StateStore<V> for InMemoryStateStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, MarketDataError> {
        Ok(self.map.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: V) -> Result<(), MarketDataError> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&mut Option<V>),
    ) -> Result<Option<V>, MarketDataError> {
        match self.map.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                f(&mut slot);
                match slot {
                    Some(value) => {
                        occupied.insert(value.clone());
                        Ok(Some(value))
                    }
                    None => {
                        occupied.remove();
                        Ok(None)
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                f(&mut slot);
                if let Some(value) = slot {
                    vacant.insert(value.clone());
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), MarketDataError> {
        self.map.remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, V)>, MarketDataError> {
        Ok(self
            .map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn clear(&self) -> Result<(), MarketDataError> {
        self.map.clear();
        Ok(())
    }
}
