//! Registry errors

use thiserror::Error;

/// Errors from the signatory registry and keystores
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Signatory not found: {0}")]
    NotFound(i64),

    #[error("No signer secret on file for signatory {0}")]
    SecretMissing(i64),

    #[error("Invalid stored timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
