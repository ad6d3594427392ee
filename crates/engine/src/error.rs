//! Engine errors

use crate::authz::DenialReason;
use hankosign_catalog::CatalogError;
use hankosign_core::TargetRef;
use hankosign_ledger::LedgerError;
use hankosign_signatory::RegistryError;
use thiserror::Error;

/// Errors from the HankoSign engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Denied ({}): {}", .0, .0.message())]
    Denied(DenialReason),

    #[error("{code} has already been performed on {target}")]
    AlreadyPerformed { target: TargetRef, code: String },

    #[error("Target not found: {0}")]
    TargetNotFound(TargetRef),

    #[error("Request already in flight, retry shortly")]
    InFlight,

    #[error("Service secret is not configured")]
    MissingServiceSecret,

    #[error("Idempotency store error: {0}")]
    IdempotencyStore(#[from] rusqlite::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyPerformed { target, code } => {
                EngineError::AlreadyPerformed { target, code }
            }
            LedgerError::DistinctSignerRequired { .. } => {
                EngineError::Denied(DenialReason::DistinctSignerRequired)
            }
            other => EngineError::Ledger(other),
        }
    }
}

impl EngineError {
    /// Denial reason, if this error is an authorization denial
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            EngineError::Denied(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
