//! Read-only seal projections and attestation audits

use chrono::{DateTime, Utc};
use hankosign_core::TargetRef;
use hankosign_ledger::Signature;
use serde::{Deserialize, Serialize};

/// One printed line of a signature box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealLine {
    pub signature_id: i64,

    /// Signatory display name
    pub who: String,

    /// `VERB/STAGE`, `-` for no stage
    pub action: String,

    pub when: DateTime<Utc>,

    /// Leading characters of the attestation digest
    pub digest_prefix: String,

    pub note: String,
}

impl SealLine {
    pub fn new(signature: &Signature, who: impl Into<String>, prefix_len: usize) -> Self {
        Self {
            signature_id: signature.id,
            who: who.into(),
            action: signature.short_code(),
            when: signature.at,
            digest_prefix: signature.digest_prefix(prefix_len).to_string(),
            note: signature.note.clone(),
        }
    }
}

impl std::fmt::Display for SealLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}  {:<16} {:<24} {}",
            self.when.format("%Y-%m-%d %H:%M"),
            self.action,
            self.who,
            self.digest_prefix
        )?;
        if !self.note.is_empty() {
            write!(f, "  \"{}\"", self.note)?;
        }
        Ok(())
    }
}

/// A signature whose stored digest could not be reproduced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMismatch {
    pub signature_id: i64,
    pub target: TargetRef,
    pub action: String,
    pub reason: String,
}

/// Result of recomputing attestations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub checked: usize,
    pub mismatches: Vec<AuditMismatch>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}
