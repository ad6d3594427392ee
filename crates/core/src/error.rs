//! Core errors

use thiserror::Error;

/// Errors raised while parsing core identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid action code '{code}': {reason}")]
    InvalidActionCode { code: String, reason: &'static str },

    #[error("Unknown verb: {0}")]
    UnknownVerb(String),

    #[error("Invalid target reference '{0}': expected 'type#id'")]
    InvalidTarget(String),

    #[error("Invalid scope '{0}': expected 'app.model'")]
    InvalidScope(String),
}
