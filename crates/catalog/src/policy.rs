//! Role grants

use chrono::{DateTime, Utc};
use hankosign_core::ActionCode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Grants a non-empty set of actions to a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: u64,
    pub role: String,
    pub actions: BTreeSet<ActionCode>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Whether this policy grants the given action
    pub fn grants(&self, code: &ActionCode) -> bool {
        self.actions.contains(code)
    }

    /// Preference between two policies granting the same action.
    ///
    /// `Greater` means `self` wins: smaller grant sets are more explicit,
    /// then the most recently updated, then the newest id.
    pub fn preference(&self, other: &Policy) -> Ordering {
        other
            .actions
            .len()
            .cmp(&self.actions.len())
            .then_with(|| self.updated_at.cmp(&other.updated_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn policy(id: u64, codes: &[&str], updated_offset_secs: i64) -> Policy {
        let now = Utc::now();
        Policy {
            id,
            role: "treasurer".to_string(),
            actions: codes.iter().map(|c| c.parse().unwrap()).collect(),
            notes: String::new(),
            created_at: now,
            updated_at: now + Duration::seconds(updated_offset_secs),
        }
    }

    #[test]
    fn test_explicit_grant_beats_broad_grant() {
        let broad = policy(
            1,
            &["APPROVE:WIREF@finance.paymentplan", "SUBMIT:-@finance.paymentplan"],
            10,
        );
        let explicit = policy(2, &["APPROVE:WIREF@finance.paymentplan"], 0);
        assert_eq!(explicit.preference(&broad), Ordering::Greater);
    }

    #[test]
    fn test_newest_update_breaks_ties() {
        let older = policy(5, &["LOCK:-@finance.paymentplan"], 0);
        let newer = policy(3, &["LOCK:-@finance.paymentplan"], 30);
        assert_eq!(newer.preference(&older), Ordering::Greater);
    }
}
