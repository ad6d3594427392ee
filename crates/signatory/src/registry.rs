//! SQLite storage for signatories and their secrets

use crate::error::{RegistryError, RegistryResult};
use crate::keystore::Keystore;
use crate::signatory::Signatory;
use chrono::{DateTime, SecondsFormat, Utc};
use hankosign_core::SecretKey;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SIGNATORY_COLUMNS: &str =
    "id, principal_id, role, display_name, active, verified, created_at, updated_at";

/// SQLite-backed signatory registry
pub struct SignatoryRegistry {
    conn: Mutex<Connection>,
}

impl SignatoryRegistry {
    /// Open (or create) a registry at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory registry (for testing)
    pub fn in_memory() -> RegistryResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> RegistryResult<Self> {
        let registry = Self {
            conn: Mutex::new(conn),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> RegistryResult<()> {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS signatories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                principal_id TEXT NOT NULL,
                role TEXT NOT NULL,
                display_name TEXT NOT NULL,
                active INTEGER NOT NULL,
                verified INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_signatories_principal
                ON signatories(principal_id, active);

            CREATE TABLE IF NOT EXISTS signatory_secrets (
                signatory_id INTEGER PRIMARY KEY REFERENCES signatories(id),
                secret TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Enroll a principal/role assignment as an (unverified) signatory.
    ///
    /// The signer secret is generated here, once.
    pub fn enroll(
        &self,
        principal_id: &str,
        role: &str,
        display_name: &str,
    ) -> RegistryResult<Signatory> {
        let now = timestamp(Utc::now());
        let secret = SecretKey::generate();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO signatories
             (principal_id, role, display_name, active, verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, 0, ?4, ?4)",
            params![principal_id, role, display_name, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO signatory_secrets (signatory_id, secret) VALUES (?1, ?2)",
            params![id, secret.expose()],
        )?;
        tx.commit()?;

        tracing::info!(signatory = id, principal = principal_id, role = role, "Enrolled signatory");
        drop(conn);
        self.get(id)
    }

    /// Get a signatory by ID
    pub fn get(&self, id: i64) -> RegistryResult<Signatory> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM signatories WHERE id = ?1", SIGNATORY_COLUMNS);
        let raw = conn
            .query_row(&sql, params![id], RawSignatory::from_row)
            .optional()?
            .ok_or(RegistryError::NotFound(id))?;
        raw.into_signatory()
    }

    /// Active signatory of a principal; the most recently updated wins
    pub fn resolve_active(&self, principal_id: &str) -> RegistryResult<Option<Signatory>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM signatories
             WHERE principal_id = ?1 AND active = 1
             ORDER BY updated_at DESC, id DESC
             LIMIT 1",
            SIGNATORY_COLUMNS
        );
        conn.query_row(&sql, params![principal_id], RawSignatory::from_row)
            .optional()?
            .map(RawSignatory::into_signatory)
            .transpose()
    }

    /// Mark a signatory as verified (specimen on file) or not
    pub fn set_verified(&self, id: i64, verified: bool) -> RegistryResult<Signatory> {
        self.update_flag("verified", id, verified)?;
        tracing::info!(signatory = id, verified, "Updated signatory verification");
        self.get(id)
    }

    /// Deactivate a signatory; rows are never deleted
    pub fn deactivate(&self, id: i64) -> RegistryResult<Signatory> {
        self.update_flag("active", id, false)?;
        tracing::info!(signatory = id, "Deactivated signatory");
        self.get(id)
    }

    fn update_flag(&self, column: &'static str, id: i64, value: bool) -> RegistryResult<()> {
        let conn = self.conn();
        let sql = format!("UPDATE signatories SET {} = ?1, updated_at = ?2 WHERE id = ?3", column);
        let rows = conn.execute(&sql, params![value, timestamp(Utc::now()), id])?;
        if rows == 0 {
            return Err(RegistryError::NotFound(id));
        }
        Ok(())
    }

    /// List all signatories (any status)
    pub fn list(&self) -> RegistryResult<Vec<Signatory>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM signatories ORDER BY id", SIGNATORY_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map([], RawSignatory::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawSignatory::into_signatory).collect()
    }
}

impl Keystore for SignatoryRegistry {
    fn signer_secret(&self, signatory_id: i64) -> RegistryResult<SecretKey> {
        let conn = self.conn();
        conn.query_row(
            "SELECT secret FROM signatory_secrets WHERE signatory_id = ?1",
            params![signatory_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .map(SecretKey::new)
        .ok_or(RegistryError::SecretMissing(signatory_id))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> RegistryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RegistryError::InvalidTimestamp(value.to_string()))
}

struct RawSignatory {
    id: i64,
    principal_id: String,
    role: String,
    display_name: String,
    active: bool,
    verified: bool,
    created_at: String,
    updated_at: String,
}

impl RawSignatory {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            principal_id: row.get(1)?,
            role: row.get(2)?,
            display_name: row.get(3)?,
            active: row.get(4)?,
            verified: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_signatory(self) -> RegistryResult<Signatory> {
        Ok(Signatory {
            id: self.id,
            principal_id: self.principal_id,
            role: self.role,
            display_name: self.display_name,
            active: self.active,
            verified: self.verified,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_enroll_and_get() {
        let registry = SignatoryRegistry::in_memory().unwrap();
        let signatory = registry.enroll("user-1", "wiref", "Erika Mustermann").unwrap();

        assert!(signatory.active);
        assert!(!signatory.verified);
        assert!(!signatory.can_sign());

        let fetched = registry.get(signatory.id).unwrap();
        assert_eq!(fetched, signatory);
    }

    #[test]
    fn test_secret_generated_once_per_signatory() {
        let registry = SignatoryRegistry::in_memory().unwrap();
        let a = registry.enroll("user-1", "wiref", "A").unwrap();
        let b = registry.enroll("user-2", "chair", "B").unwrap();

        let secret_a = registry.signer_secret(a.id).unwrap();
        assert_eq!(registry.signer_secret(a.id).unwrap(), secret_a);
        assert_ne!(registry.signer_secret(b.id).unwrap(), secret_a);
        assert!(matches!(registry.signer_secret(99), Err(RegistryError::SecretMissing(99))));
    }

    #[test]
    fn test_resolve_active_skips_inactive() {
        let registry = SignatoryRegistry::in_memory().unwrap();
        let signatory = registry.enroll("user-1", "wiref", "A").unwrap();

        assert_eq!(registry.resolve_active("user-1").unwrap().unwrap().id, signatory.id);

        registry.deactivate(signatory.id).unwrap();
        assert!(registry.resolve_active("user-1").unwrap().is_none());

        // Still retrievable for ledger lookups
        assert!(!registry.get(signatory.id).unwrap().active);
    }

    #[test]
    fn test_resolve_active_prefers_recently_updated() {
        let registry = SignatoryRegistry::in_memory().unwrap();
        let first = registry.enroll("user-1", "wiref", "A (WiRef)").unwrap();
        let _second = registry.enroll("user-1", "chair", "A (Chair)").unwrap();

        registry.set_verified(first.id, true).unwrap();

        let resolved = registry.resolve_active("user-1").unwrap().unwrap();
        assert_eq!(resolved.id, first.id);
        assert!(resolved.verified);
    }

    #[test]
    fn test_update_unknown_signatory() {
        let registry = SignatoryRegistry::in_memory().unwrap();
        assert!(matches!(registry.set_verified(42, true), Err(RegistryError::NotFound(42))));
        assert!(matches!(registry.get(42), Err(RegistryError::NotFound(42))));
    }

    #[test]
    fn test_file_backed_registry_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let id = {
            let registry = SignatoryRegistry::new(&path).unwrap();
            let signatory = registry.enroll("user-1", "wiref", "A").unwrap();
            registry.set_verified(signatory.id, true).unwrap();
            signatory.id
        };

        let registry = SignatoryRegistry::new(&path).unwrap();
        let list = registry.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert!(list[0].verified);
    }
}
