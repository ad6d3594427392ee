//! HankoSign Ledger - Append-only store of attested signatures
//!
//! Every workflow fact ("signatory performed VERB/STAGE on target at T") is
//! a [`Signature`] row. Rows are written once, inside an exclusive SQLite
//! transaction, and never updated or deleted.
//!
//! # Key Types
//! - `Signature`: Immutable ledger entry with its attestation digest
//! - `SignatureDraft`: Everything the recording engine decided before the write
//! - `Ledger`: SQLite-backed store with race-free uniqueness and soft dedupe
//! - `attestation`: HMAC-SHA256 digest over the action/target tuple

pub mod attestation;
pub mod error;
pub mod signature;
pub mod store;

pub use attestation::{attestation_digest, verify_attestation};
pub use error::{LedgerError, LedgerResult};
pub use signature::{Appended, Signature, SignatureDraft};
pub use store::Ledger;
