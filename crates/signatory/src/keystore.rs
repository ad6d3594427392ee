//! Signer secret providers

use crate::error::{RegistryError, RegistryResult};
use hankosign_core::SecretKey;
use std::collections::HashMap;
use std::sync::RwLock;

/// Source of per-signer secrets
///
/// Business logic never reads secret columns directly; it asks a keystore,
/// which keeps key material isolable and rotatable.
pub trait Keystore: Send + Sync {
    /// Secret of the given signatory
    fn signer_secret(&self, signatory_id: i64) -> RegistryResult<SecretKey>;
}

/// In-memory keystore, for tests and for hosts that keep secrets elsewhere
#[derive(Debug, Default)]
pub struct MemoryKeystore {
    secrets: RwLock<HashMap<i64, SecretKey>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or rotate) the secret of a signatory
    pub fn insert(&self, signatory_id: i64, secret: SecretKey) {
        self.secrets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(signatory_id, secret);
    }
}

impl Keystore for MemoryKeystore {
    fn signer_secret(&self, signatory_id: i64) -> RegistryResult<SecretKey> {
        self.secrets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&signatory_id)
            .cloned()
            .ok_or(RegistryError::SecretMissing(signatory_id))
    }
}
