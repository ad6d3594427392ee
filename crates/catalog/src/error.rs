//! Catalog errors

use hankosign_core::{ActionCode, CoreError};
use thiserror::Error;

/// Errors from catalog definition and lookup
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Action already defined: {0}")]
    DuplicateAction(ActionCode),

    #[error("Invalid grant for role '{role}': {reason}")]
    InvalidGrant { role: String, reason: String },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(u64),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
