//! # HankoSign Signatory Registry
//!
//! Binds an authenticated principal (and the role they hold) to a signing
//! capability.
//!
//! - Signatories are created active and unverified; verification marks that a
//!   specimen is on file.
//! - Each signatory gets a random secret at enrollment. The secret lives in
//!   its own table and is only reachable through the [`Keystore`] trait.
//! - Signatories are deactivated, never deleted, so ledger entries always
//!   resolve.

mod error;
mod keystore;
mod registry;
mod signatory;

pub use error::{RegistryError, RegistryResult};
pub use keystore::{Keystore, MemoryKeystore};
pub use registry::SignatoryRegistry;
pub use signatory::Signatory;
