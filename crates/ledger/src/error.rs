//! Ledger errors

use hankosign_core::TargetRef;
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{code} has already been performed on {target}")]
    AlreadyPerformed { target: TargetRef, code: String },

    #[error("Signatory {signatory_id} already signed another step on {target}")]
    DistinctSignerRequired { target: TargetRef, signatory_id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signature not found: {0}")]
    NotFound(i64),

    #[error("Corrupt ledger row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
