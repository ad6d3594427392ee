//! Catalog actions

use chrono::{DateTime, Utc};
use hankosign_core::{ActionCode, Verb};
use serde::{Deserialize, Serialize};

/// Behavioural flags of an action, fixed at definition time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFlags {
    /// Allow more than one signature per target/verb/stage
    #[serde(default)]
    pub repeatable: bool,

    /// Separation of duties: the signer must not have signed anything
    /// else on the same target within this scope
    #[serde(default)]
    pub require_distinct_signer: bool,
}

impl ActionFlags {
    pub fn repeatable() -> Self {
        Self {
            repeatable: true,
            ..Self::default()
        }
    }

    pub fn distinct_signer() -> Self {
        Self {
            require_distinct_signer: true,
            ..Self::default()
        }
    }
}

/// An allowed action on a target type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Identity tuple
    pub code: ActionCode,

    pub flags: ActionFlags,

    /// Human-facing label (housekeeping, may change)
    pub human_label: String,

    /// Help text (housekeeping, may change)
    pub comment: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    pub(crate) fn new(code: ActionCode, flags: ActionFlags, human_label: String) -> Self {
        let now = Utc::now();
        Self {
            code,
            flags,
            human_label,
            comment: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn verb(&self) -> Verb {
        self.code.verb
    }

    pub fn stage(&self) -> &str {
        &self.code.stage
    }

    pub fn scope(&self) -> &str {
        &self.code.scope
    }

    pub fn is_repeatable(&self) -> bool {
        self.flags.repeatable
    }

    pub fn requires_distinct_signer(&self) -> bool {
        self.flags.require_distinct_signer
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code, self.human_label)
    }
}
