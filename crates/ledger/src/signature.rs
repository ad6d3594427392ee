//! Ledger entries

use chrono::{DateTime, Utc};
use hankosign_core::{ActionCode, TargetRef, Verb};
use serde::{Deserialize, Serialize};

/// Immutable fact: a signatory performed VERB/STAGE on a target at `at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Ledger sequence (strictly increasing)
    pub id: i64,

    pub signatory_id: i64,

    pub target: TargetRef,

    // Action snapshot, copied at write time
    pub verb: Verb,
    pub stage: String,
    pub scope: String,
    pub repeatable: bool,

    pub at: DateTime<Utc>,

    pub note: String,

    pub payload: serde_json::Value,

    /// Requesting client address, for audit
    pub client_ip: Option<String>,

    /// Hex HMAC-SHA256, see [`crate::attestation`]
    pub attestation: String,
}

impl Signature {
    /// Snapshot of the action this signature was recorded for
    pub fn action_code(&self) -> ActionCode {
        ActionCode {
            verb: self.verb,
            stage: self.stage.clone(),
            scope: self.scope.clone(),
        }
    }

    /// Short form used on seals: `VERB/STAGE` (`-` for no stage)
    pub fn short_code(&self) -> String {
        let stage = if self.stage.is_empty() { "-" } else { &self.stage };
        format!("{}/{}", self.verb, stage)
    }

    /// First `len` characters of the attestation digest
    pub fn digest_prefix(&self, len: usize) -> &str {
        let end = len.min(self.attestation.len());
        &self.attestation[..end]
    }

    /// Ordering key for "which happened later"
    pub fn sequence_key(&self) -> (DateTime<Utc>, i64) {
        (self.at, self.id)
    }
}

/// A signature the recording engine is about to write
#[derive(Debug, Clone)]
pub struct SignatureDraft {
    pub signatory_id: i64,
    pub target: TargetRef,
    pub action: ActionCode,
    pub repeatable: bool,
    /// Refuse if this signatory already signed anything on the target
    /// within the action's scope
    pub distinct_signer: bool,
    pub note: String,
    pub payload: serde_json::Value,
    pub client_ip: Option<String>,
    pub attestation: String,
}

/// Outcome of a ledger append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// A new row was written
    Created(Signature),

    /// The same signatory signed the same key moments ago; that row is returned
    Deduplicated(Signature),
}

impl Appended {
    pub fn signature(&self) -> &Signature {
        match self {
            Appended::Created(sig) | Appended::Deduplicated(sig) => sig,
        }
    }

    pub fn into_signature(self) -> Signature {
        match self {
            Appended::Created(sig) | Appended::Deduplicated(sig) => sig,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Appended::Created(_))
    }
}
