//! Idempotency gate for `sign_once`
//!
//! A key is derived from the action, principal, target and caller-supplied
//! request id. The first caller to add it within the window wins; everyone
//! else is told the key is taken.
//!
//! [`MemoryStore`] serves a single process. [`SqliteStore`] keeps keys in a
//! database file so separate processes (e.g. CLI invocations) share them.

use crate::error::EngineResult;
use chrono::Utc;
use hankosign_core::{ActionCode, TargetRef};
use rusqlite::{params, Connection, TransactionBehavior};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Shared store with atomic add-if-absent semantics
pub trait KeyValueStore: Send + Sync {
    /// Add `key` with a lifetime of `ttl`. Returns `false` if an unexpired
    /// entry already exists.
    fn add_if_absent(&self, key: &str, ttl: Duration) -> EngineResult<bool>;

    /// Drop `key` so a later caller can retry
    fn remove(&self, key: &str) -> EngineResult<()>;
}

/// In-process TTL store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|expires| **expires > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn add_if_absent(&self, key: &str, ttl: Duration) -> EngineResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, expires| *expires > now);

        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    fn remove(&self, key: &str) -> EngineResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// SQLite-backed TTL store, shared by every process opening the same file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> EngineResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> EngineResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS idempotency_keys (
                key TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for SqliteStore {
    fn add_if_absent(&self, key: &str, ttl: Duration) -> EngineResult<bool> {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM idempotency_keys WHERE expires_at <= ?1",
            params![now],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO idempotency_keys (key, expires_at) VALUES (?1, ?2)",
            params![key, expires_at],
        )?;
        tx.commit()?;

        Ok(inserted == 1)
    }

    fn remove(&self, key: &str) -> EngineResult<()> {
        self.conn()
            .execute("DELETE FROM idempotency_keys WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Derive the idempotency key for a `sign_once` request
pub fn idempotency_key(
    code: &ActionCode,
    principal: &str,
    target: &TargetRef,
    request_id: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        code.verb.code(),
        code.stage.as_str(),
        code.scope.as_str(),
        principal,
        target.type_name.as_str(),
        target.id.as_str(),
        request_id,
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("hankosign:once:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(10);

    #[test]
    fn test_add_if_absent() {
        let store = MemoryStore::new();
        assert!(store.add_if_absent("k", TTL).unwrap());
        assert!(!store.add_if_absent("k", TTL).unwrap());
        assert!(store.add_if_absent("other", TTL).unwrap());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_releases_key() {
        let store = MemoryStore::new();
        assert!(store.add_if_absent("k", TTL).unwrap());
        store.remove("k").unwrap();
        assert!(store.add_if_absent("k", TTL).unwrap());
    }

    #[test]
    fn test_expired_key_is_free() {
        let store = MemoryStore::new();
        assert!(store.add_if_absent("k", Duration::ZERO).unwrap());
        assert!(store.is_empty());
        assert!(store.add_if_absent("k", TTL).unwrap());
    }

    #[test]
    fn test_sqlite_store_add_remove_expire() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.add_if_absent("k", TTL).unwrap());
        assert!(!store.add_if_absent("k", TTL).unwrap());

        store.remove("k").unwrap();
        assert!(store.add_if_absent("k", TTL).unwrap());

        assert!(store.add_if_absent("short", Duration::ZERO).unwrap());
        assert!(store.add_if_absent("short", TTL).unwrap());
    }

    #[test]
    fn test_sqlite_store_shared_between_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idempotency.db");

        let first = SqliteStore::new(&path).unwrap();
        let second = SqliteStore::new(&path).unwrap();

        assert!(first.add_if_absent("req-1", TTL).unwrap());
        assert!(!second.add_if_absent("req-1", TTL).unwrap());

        second.remove("req-1").unwrap();
        assert!(first.add_if_absent("req-1", TTL).unwrap());
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let code: ActionCode = "RELEASE:-@finance.paymentplan".parse().unwrap();
        let other_code: ActionCode = "RELEASE:PDF@finance.paymentplan".parse().unwrap();
        let target = TargetRef::new("finance.paymentplan", "1").unwrap();
        let other_target = TargetRef::new("finance.paymentplan", "2").unwrap();

        let base = idempotency_key(&code, "alice", &target, "req-1");
        assert_eq!(base, idempotency_key(&code, "alice", &target, "req-1"));
        assert_ne!(base, idempotency_key(&other_code, "alice", &target, "req-1"));
        assert_ne!(base, idempotency_key(&code, "bob", &target, "req-1"));
        assert_ne!(base, idempotency_key(&code, "alice", &other_target, "req-1"));
        assert_ne!(base, idempotency_key(&code, "alice", &target, "req-2"));
    }
}
