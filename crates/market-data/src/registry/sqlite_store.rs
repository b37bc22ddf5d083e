//! SQLite-backed [`StateStore`].
//!
//! Values are stored as JSON text in a single `provider_state` table,
//! partitioned by namespace so the breaker and the limiter can share one
//! database file. Several processes pointing at the same file see the same
//! circuits and buckets; updates run inside `BEGIN IMMEDIATE` transactions.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::warn;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::state_store::StateStore;
use crate::errors::MarketDataError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS provider_state (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
)";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStateStore<V> {
    conn: Mutex<Connection>,
    namespace: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqliteStateStore<V> {
    /// Open (or create) a store in the database file at `path`.
    pub fn open(path: impl AsRef<Path>, namespace: &str) -> Result<Self, MarketDataError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, namespace)
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory(namespace: &str) -> Result<Self, MarketDataError> {
        Self::with_connection(Connection::open_in_memory()?, namespace)
    }

    fn with_connection(conn: Connection, namespace: &str) -> Result<Self, MarketDataError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.to_string(),
            _value: PhantomData,
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("SQLite state store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn decode<V: DeserializeOwned>(raw: &str) -> Result<V, MarketDataError> {
    Ok(serde_json::from_str(raw)?)
}

impl<V> StateStore<V> for SqliteStateStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn get(&self, key: &str) -> Result<Option<V>, MarketDataError> {
        let conn = self.lock_conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM provider_state WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref().map(decode).transpose()
    }

    fn set(&self, key: &str, value: V) -> Result<(), MarketDataError> {
        let raw = serde_json::to_string(&value)?;
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO provider_state (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![self.namespace, key, raw],
        )?;
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&mut Option<V>),
    ) -> Result<Option<V>, MarketDataError> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT value FROM provider_state WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;

        // An undecodable row is treated as absent and overwritten
        let mut slot: Option<V> = match raw.as_deref().map(decode::<V>).transpose() {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unreadable state for '{}': {}", key, e);
                None
            }
        };

        f(&mut slot);

        match &slot {
            Some(value) => {
                let encoded = serde_json::to_string(value)?;
                tx.execute(
                    "INSERT INTO provider_state (namespace, key, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                    params![self.namespace, key, encoded],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM provider_state WHERE namespace = ?1 AND key = ?2",
                    params![self.namespace, key],
                )?;
            }
        }

        tx.commit()?;
        Ok(slot)
    }

    fn remove(&self, key: &str) -> Result<(), MarketDataError> {
        let conn = self.lock_conn();
        conn.execute(
            "DELETE FROM provider_state WHERE namespace = ?1 AND key = ?2",
            params![self.namespace, key],
        )?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, V)>, MarketDataError> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare("SELECT key, value FROM provider_state WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map(params![self.namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, raw)| decode(&raw).map(|value| (key, value)))
            .collect()
    }

    fn clear(&self) -> Result<(), MarketDataError> {
        let conn = self.lock_conn();
        conn.execute(
            "DELETE FROM provider_state WHERE namespace = ?1",
            params![self.namespace],
        )?;
        Ok(())
    }
}
