//! Secret key material
//!
//! Secrets are kept as hex strings (the form they are stored and configured
//! in). `Debug` never prints the value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes in a generated secret
pub const SECRET_BYTES: usize = 32;

/// Opaque secret, hex-encoded
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wrap an existing secret string
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Generate a fresh random secret
    pub fn generate() -> Self {
        let bytes: [u8; SECRET_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Raw secret text (use only to derive keys)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}
