//! Signatory records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A principal's bound signing capability
///
/// The signer secret is deliberately not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatory {
    pub id: i64,

    /// Authenticated principal this capability belongs to
    pub principal_id: String,

    /// Role held by the principal for this assignment
    pub role: String,

    /// Printed name used on seals
    pub display_name: String,

    pub active: bool,

    /// Specimen/attestation on file
    pub verified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Signatory {
    /// Whether this signatory may sign at all
    pub fn can_sign(&self) -> bool {
        self.active && self.verified
    }
}

impl std::fmt::Display for Signatory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.role)
    }
}
