//! SQLite ledger storage
//!
//! Writes run inside `BEGIN IMMEDIATE`, which takes the database write lock
//! before the uniqueness check, so check-then-insert cannot interleave with
//! another writer. A partial unique index on non-repeatable rows backs the
//! check; a constraint violation on insert maps to `AlreadyPerformed`. The
//! separation-of-duties check runs under the same lock.

use crate::error::{LedgerError, LedgerResult};
use crate::signature::{Appended, Signature, SignatureDraft};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use hankosign_core::{TargetRef, Verb};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const SIGNATURE_COLUMNS: &str = "id, signatory_id, target_type, target_id, verb, stage, scope, \
     repeatable, at, note, payload, client_ip, attestation";

/// Append-only signature ledger
pub struct Ledger {
    conn: Mutex<Connection>,
}

impl Ledger {
    /// Open (or create) a ledger at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory ledger (for testing)
    pub fn in_memory() -> LedgerResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> LedgerResult<Self> {
        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> LedgerResult<()> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS signatures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signatory_id INTEGER NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                verb TEXT NOT NULL,
                stage TEXT NOT NULL,
                scope TEXT NOT NULL,
                repeatable INTEGER NOT NULL,
                at TEXT NOT NULL,
                note TEXT NOT NULL,
                payload TEXT NOT NULL,
                client_ip TEXT,
                attestation TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS uq_sig_nonrepeat_per_target_verb_stage
                ON signatures(target_type, target_id, verb, stage)
                WHERE repeatable = 0;

            CREATE INDEX IF NOT EXISTS idx_signatures_target
                ON signatures(target_type, target_id);

            CREATE INDEX IF NOT EXISTS idx_signatures_attestation
                ON signatures(attestation);",
        )?;
        Ok(())
    }

    /// Append a signature atomically.
    ///
    /// Non-repeatable drafts fail with `AlreadyPerformed` when any signature
    /// exists for `(target, verb, stage)`. Drafts flagged `distinct_signer`
    /// fail with `DistinctSignerRequired` when the signatory already signed
    /// on the target within the scope. Otherwise, if the same signatory
    /// signed the same key less than `dedupe_window` ago, that row is
    /// returned as `Deduplicated` and nothing is written.
    pub fn append(
        &self,
        draft: SignatureDraft,
        dedupe_window: Duration,
    ) -> LedgerResult<Appended> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let already_performed = || LedgerError::AlreadyPerformed {
            target: draft.target.clone(),
            code: draft.action.to_string(),
        };

        if !draft.repeatable
            && latest_matching(&tx, &draft.target, draft.action.verb, &draft.action.stage, None)?
                .is_some()
        {
            return Err(already_performed());
        }

        if draft.distinct_signer
            && signed_in_scope(&tx, draft.signatory_id, &draft.target, &draft.action.scope)?
        {
            warn!(
                code = %draft.action,
                target = %draft.target,
                signatory = draft.signatory_id,
                "Signatory already signed in this scope"
            );
            return Err(LedgerError::DistinctSignerRequired {
                target: draft.target.clone(),
                signatory_id: draft.signatory_id,
            });
        }

        let now = Utc::now();
        if let Some(existing) = latest_matching(
            &tx,
            &draft.target,
            draft.action.verb,
            &draft.action.stage,
            Some(draft.signatory_id),
        )? {
            if now - existing.at < dedupe_window {
                debug!(
                    signature_id = existing.id,
                    target = %draft.target,
                    "Duplicate append within window"
                );
                return Ok(Appended::Deduplicated(existing));
            }
        }

        let payload = serde_json::to_string(&draft.payload)?;
        let inserted = tx.execute(
            "INSERT INTO signatures
             (signatory_id, target_type, target_id, verb, stage, scope, repeatable,
              at, note, payload, client_ip, attestation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                draft.signatory_id,
                draft.target.type_name,
                draft.target.id,
                draft.action.verb.code(),
                draft.action.stage,
                draft.action.scope,
                draft.repeatable,
                timestamp(now),
                draft.note,
                payload,
                draft.client_ip,
                draft.attestation,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                warn!(code = %draft.action, target = %draft.target, "Unique index rejected append");
                return Err(already_performed());
            }
            Err(e) => return Err(e.into()),
        }

        let id = tx.last_insert_rowid();
        let signature = get_signature(&tx, id)?;
        tx.commit()?;

        debug!(
            signature_id = id,
            code = %draft.action,
            target = %draft.target,
            "Signature appended"
        );
        Ok(Appended::Created(signature))
    }

    /// Get a signature by ID
    pub fn get(&self, id: i64) -> LedgerResult<Signature> {
        get_signature(&self.conn(), id)
    }

    /// All signatures on a target, oldest first
    pub fn for_target(&self, target: &TargetRef) -> LedgerResult<Vec<Signature>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM signatures
             WHERE target_type = ?1 AND target_id = ?2
             ORDER BY at ASC, id ASC",
            SIGNATURE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![target.type_name, target.id], RawSignature::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawSignature::into_signature).collect()
    }

    /// Every signature in the ledger, oldest first
    pub fn all(&self) -> LedgerResult<Vec<Signature>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM signatures ORDER BY id ASC", SIGNATURE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map([], RawSignature::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawSignature::into_signature).collect()
    }

    /// Most recent signature for `(target, verb, stage)`
    pub fn latest(
        &self,
        target: &TargetRef,
        verb: Verb,
        stage: &str,
    ) -> LedgerResult<Option<Signature>> {
        latest_matching(&self.conn(), target, verb, stage, None)
    }

    /// Whether any signature exists for `(target, verb, stage)`
    pub fn has_signature(&self, target: &TargetRef, verb: Verb, stage: &str) -> LedgerResult<bool> {
        Ok(self.latest(target, verb, stage)?.is_some())
    }

    /// Timestamp of the first signature for `(target, verb, stage)`
    pub fn first_signed_at(
        &self,
        target: &TargetRef,
        verb: Verb,
        stage: &str,
    ) -> LedgerResult<Option<DateTime<Utc>>> {
        let conn = self.conn();
        let at: Option<String> = conn
            .query_row(
                "SELECT at FROM signatures
                 WHERE target_type = ?1 AND target_id = ?2 AND verb = ?3 AND stage = ?4
                 ORDER BY at ASC, id ASC
                 LIMIT 1",
                params![target.type_name, target.id, verb.code(), stage],
                |row| row.get(0),
            )
            .optional()?;
        at.map(|value| parse_timestamp(0, &value)).transpose()
    }

    /// Whether a signatory already signed anything on `target` within `scope`
    pub fn signed_in_scope(
        &self,
        signatory_id: i64,
        target: &TargetRef,
        scope: &str,
    ) -> LedgerResult<bool> {
        signed_in_scope(&self.conn(), signatory_id, target, scope)
    }

    /// Number of signatures in the ledger
    pub fn count(&self) -> LedgerResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM signatures", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn latest_matching(
    conn: &Connection,
    target: &TargetRef,
    verb: Verb,
    stage: &str,
    signatory_id: Option<i64>,
) -> LedgerResult<Option<Signature>> {
    let sql = format!(
        "SELECT {} FROM signatures
         WHERE target_type = ?1 AND target_id = ?2 AND verb = ?3 AND stage = ?4
           AND (?5 IS NULL OR signatory_id = ?5)
         ORDER BY at DESC, id DESC
         LIMIT 1",
        SIGNATURE_COLUMNS
    );
    conn.query_row(
        &sql,
        params![target.type_name, target.id, verb.code(), stage, signatory_id],
        RawSignature::from_row,
    )
    .optional()?
    .map(RawSignature::into_signature)
    .transpose()
}

fn signed_in_scope(
    conn: &Connection,
    signatory_id: i64,
    target: &TargetRef,
    scope: &str,
) -> LedgerResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM signatures
             WHERE signatory_id = ?1 AND target_type = ?2 AND target_id = ?3 AND scope = ?4
             LIMIT 1",
            params![signatory_id, target.type_name, target.id, scope],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn get_signature(conn: &Connection, id: i64) -> LedgerResult<Signature> {
    let sql = format!("SELECT {} FROM signatures WHERE id = ?1", SIGNATURE_COLUMNS);
    conn.query_row(&sql, params![id], RawSignature::from_row)
        .optional()?
        .ok_or(LedgerError::NotFound(id))?
        .into_signature()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: i64, value: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Corrupt {
            id,
            reason: format!("invalid timestamp '{}': {}", value, e),
        })
}

struct RawSignature {
    id: i64,
    signatory_id: i64,
    target_type: String,
    target_id: String,
    verb: String,
    stage: String,
    scope: String,
    repeatable: bool,
    at: String,
    note: String,
    payload: String,
    client_ip: Option<String>,
    attestation: String,
}

impl RawSignature {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            signatory_id: row.get(1)?,
            target_type: row.get(2)?,
            target_id: row.get(3)?,
            verb: row.get(4)?,
            stage: row.get(5)?,
            scope: row.get(6)?,
            repeatable: row.get(7)?,
            at: row.get(8)?,
            note: row.get(9)?,
            payload: row.get(10)?,
            client_ip: row.get(11)?,
            attestation: row.get(12)?,
        })
    }

    fn into_signature(self) -> LedgerResult<Signature> {
        let corrupt = |reason: String| LedgerError::Corrupt { id: self.id, reason };

        let verb: Verb = self
            .verb
            .parse()
            .map_err(|_| corrupt(format!("unknown verb '{}'", self.verb)))?;

        // Stored rows are trusted as-is; no normalization on read
        let target = TargetRef {
            type_name: self.target_type,
            id: self.target_id,
        };

        Ok(Signature {
            id: self.id,
            signatory_id: self.signatory_id,
            target,
            verb,
            stage: self.stage,
            scope: self.scope,
            repeatable: self.repeatable,
            at: parse_timestamp(self.id, &self.at)?,
            note: self.note,
            payload: serde_json::from_str(&self.payload)?,
            client_ip: self.client_ip,
            attestation: self.attestation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hankosign_core::ActionCode;
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    fn window() -> Duration {
        Duration::seconds(10)
    }

    fn target() -> TargetRef {
        TargetRef::new("finance.paymentplan", "42").unwrap()
    }

    fn draft(signatory_id: i64, code: &str, repeatable: bool) -> SignatureDraft {
        SignatureDraft {
            signatory_id,
            target: target(),
            action: code.parse::<ActionCode>().unwrap(),
            repeatable,
            distinct_signer: false,
            note: String::new(),
            payload: json!({}),
            client_ip: Some("10.0.0.1".to_string()),
            attestation: format!("digest-{}-{}", signatory_id, code),
        }
    }

    #[test]
    fn test_append_and_get() {
        let ledger = Ledger::in_memory().unwrap();
        let appended = ledger
            .append(draft(1, "SUBMIT:-@finance.paymentplan", false), window())
            .unwrap();

        assert!(appended.is_created());
        let sig = appended.into_signature();
        assert_eq!(sig.verb, Verb::Submit);
        assert_eq!(sig.stage, "");
        assert_eq!(sig.short_code(), "SUBMIT/-");
        assert_eq!(sig.client_ip.as_deref(), Some("10.0.0.1"));

        let fetched = ledger.get(sig.id).unwrap();
        assert_eq!(fetched, sig);
    }

    #[test]
    fn test_non_repeatable_refuses_second_signature() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append(draft(1, "APPROVE:WIREF@finance.paymentplan", false), window())
            .unwrap();

        let result = ledger.append(draft(2, "APPROVE:WIREF@finance.paymentplan", false), window());
        assert!(matches!(result, Err(LedgerError::AlreadyPerformed { .. })));
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_soft_dedupe_for_repeatable() {
        let ledger = Ledger::in_memory().unwrap();
        let first = ledger
            .append(draft(1, "RELEASE:-@finance.paymentplan", true), window())
            .unwrap();
        let second = ledger
            .append(draft(1, "RELEASE:-@finance.paymentplan", true), window())
            .unwrap();

        assert!(matches!(second, Appended::Deduplicated(_)));
        assert_eq!(first.signature().id, second.signature().id);
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_dedupe_window_zero_allows_repeats() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append(draft(1, "RELEASE:-@finance.paymentplan", true), Duration::zero())
            .unwrap();
        let second = ledger
            .append(draft(1, "RELEASE:-@finance.paymentplan", true), Duration::zero())
            .unwrap();

        assert!(second.is_created());
        assert_eq!(ledger.count().unwrap(), 2);
    }

    #[test]
    fn test_repeatable_by_other_signatory_is_new_row() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append(draft(1, "RELEASE:-@finance.paymentplan", true), window())
            .unwrap();
        let other = ledger
            .append(draft(2, "RELEASE:-@finance.paymentplan", true), window())
            .unwrap();

        assert!(other.is_created());
        assert_eq!(ledger.for_target(&target()).unwrap().len(), 2);
    }

    #[test]
    fn test_queries() {
        let ledger = Ledger::in_memory().unwrap();
        let submit = ledger
            .append(draft(1, "SUBMIT:-@finance.paymentplan", false), window())
            .unwrap()
            .into_signature();
        ledger
            .append(draft(2, "APPROVE:WIREF@finance.paymentplan", false), window())
            .unwrap();

        assert!(ledger.has_signature(&target(), Verb::Submit, "").unwrap());
        assert!(!ledger.has_signature(&target(), Verb::Approve, "CHAIR").unwrap());
        assert_eq!(
            ledger.first_signed_at(&target(), Verb::Submit, "").unwrap(),
            Some(submit.at)
        );
        assert!(ledger.signed_in_scope(1, &target(), "finance.paymentplan").unwrap());
        assert!(!ledger.signed_in_scope(3, &target(), "finance.paymentplan").unwrap());

        let history = ledger.for_target(&target()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].verb, Verb::Submit);
        assert_eq!(history[1].verb, Verb::Approve);
    }

    #[test]
    fn test_concurrent_appends_yield_one_row() {
        let ledger = Arc::new(Ledger::in_memory().unwrap());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let draft = draft(i as i64 + 1, "LOCK:-@finance.paymentplan", false);
                    ledger.append(draft, window())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::AlreadyPerformed { .. })))
            .count();

        assert_eq!(created, 1);
        assert_eq!(refused, threads - 1);
        assert_eq!(ledger.count().unwrap(), 1);
    }

    fn distinct_draft(signatory_id: i64, code: &str) -> SignatureDraft {
        SignatureDraft {
            distinct_signer: true,
            ..draft(signatory_id, code, false)
        }
    }

    #[test]
    fn test_distinct_signer_checked_in_append() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append(distinct_draft(1, "APPROVE:WIREF@finance.paymentplan"), window())
            .unwrap();

        let result =
            ledger.append(distinct_draft(1, "APPROVE:CHAIR@finance.paymentplan"), window());
        assert!(matches!(
            result,
            Err(LedgerError::DistinctSignerRequired { signatory_id: 1, .. })
        ));

        // Another signatory may take the second stage
        let other = ledger
            .append(distinct_draft(2, "APPROVE:CHAIR@finance.paymentplan"), window())
            .unwrap();
        assert!(other.is_created());
        assert_eq!(ledger.count().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_stages_by_one_signatory() {
        for round in 0..20 {
            let ledger = Arc::new(Ledger::in_memory().unwrap());
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [
                "APPROVE:WIREF@finance.paymentplan",
                "APPROVE:CHAIR@finance.paymentplan",
            ]
            .into_iter()
            .map(|code| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.append(distinct_draft(1, code), window())
                })
            })
            .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let created = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(created, 1, "round {}", round);
            assert_eq!(ledger.count().unwrap(), 1);
        }
    }

    #[test]
    fn test_file_ledger_persists_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let id = {
            let ledger = Ledger::new(&path).unwrap();
            ledger
                .append(draft(1, "SUBMIT:-@finance.paymentplan", false), window())
                .unwrap()
                .into_signature()
                .id
        };

        let ledger = Ledger::new(&path).unwrap();
        let sig = ledger.get(id).unwrap();
        assert_eq!(sig.attestation, "digest-1-SUBMIT:-@finance.paymentplan");

        // The unique index survives reopening
        let again = ledger.append(draft(2, "SUBMIT:-@finance.paymentplan", false), window());
        assert!(matches!(again, Err(LedgerError::AlreadyPerformed { .. })));
    }
}
