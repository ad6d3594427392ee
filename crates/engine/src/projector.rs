//! State projector
//!
//! Workflow state is never stored. It is replayed from a target's
//! signatures plus the approval stages the catalog requires for its type.

use chrono::{DateTime, Utc};
use hankosign_core::Verb;
use hankosign_ledger::Signature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Derived workflow facts for one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Latest SUBMIT is later than the latest WITHDRAW (or there is none)
    pub submitted: bool,

    /// Stages with at least one APPROVE
    pub approved_stages: BTreeSet<String>,

    /// Any REJECT at all, staged or not
    pub rejected: bool,

    /// Stages with at least one REJECT
    pub rejected_stages: BTreeSet<String>,

    /// APPROVE stages the catalog defines for the target type
    pub required_stages: BTreeSet<String>,

    /// Every required stage approved; never true when none are required
    pub is_final: bool,

    /// Editing should be refused
    pub locked: bool,

    /// Latest LOCK is later than the latest UNLOCK (or there is none)
    pub explicit_locked: bool,
}

impl StateSnapshot {
    pub fn is_approved(&self, stage: &str) -> bool {
        self.approved_stages.contains(stage)
    }
}

type Sequence = (DateTime<Utc>, i64);

fn latest(signatures: &[Signature], verb: Verb) -> Option<Sequence> {
    signatures
        .iter()
        .filter(|s| s.verb == verb)
        .map(Signature::sequence_key)
        .max()
}

/// `on` happened and is later than `off` (or `off` never happened)
fn toggled_on(signatures: &[Signature], on: Verb, off: Verb) -> bool {
    match (latest(signatures, on), latest(signatures, off)) {
        (Some(on), Some(off)) => on > off,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn stages(signatures: &[Signature], verb: Verb) -> BTreeSet<String> {
    signatures
        .iter()
        .filter(|s| s.verb == verb && !s.stage.is_empty())
        .map(|s| s.stage.clone())
        .collect()
}

/// Replay signatures into a snapshot. Input order does not matter.
pub fn project(signatures: &[Signature], required_stages: BTreeSet<String>) -> StateSnapshot {
    let submitted = toggled_on(signatures, Verb::Submit, Verb::Withdraw);
    let explicit_locked = toggled_on(signatures, Verb::Lock, Verb::Unlock);

    let approved_stages = stages(signatures, Verb::Approve);
    let rejected_stages = stages(signatures, Verb::Reject);
    let rejected = signatures.iter().any(|s| s.verb == Verb::Reject);

    let is_final = !required_stages.is_empty() && required_stages.is_subset(&approved_stages);
    let locked = explicit_locked || submitted || !approved_stages.is_empty() || is_final;

    StateSnapshot {
        submitted,
        approved_stages,
        rejected,
        rejected_stages,
        required_stages,
        is_final,
        locked,
        explicit_locked,
    }
}

/// Single prioritized status of an object
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    Locked,
    Rejected,
    Final,
    #[strum(serialize = "approved-tier1")]
    #[serde(rename = "approved-tier1")]
    ApprovedTier1,
    Submitted,
    Draft,
}

impl StatusCode {
    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::Locked => "Locked",
            StatusCode::Rejected => "Rejected",
            StatusCode::Final => "Final",
            StatusCode::ApprovedTier1 => "Approved (tier 1)",
            StatusCode::Submitted => "Submitted",
            StatusCode::Draft => "Draft",
        }
    }
}

/// Status code plus its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatus {
    pub code: StatusCode,
    pub label: String,
}

impl From<StatusCode> for ObjectStatus {
    fn from(code: StatusCode) -> Self {
        Self {
            code,
            label: code.label().to_string(),
        }
    }
}

/// Collapse a snapshot into one status.
///
/// Priority: locked, rejected, final, approved (tier 1), submitted, draft.
/// `final_stage` / `tier1_stage` name the stages that mean "final" and
/// "first-tier approved"; without them the catalog-wide final flag and
/// "any stage approved" are used.
pub fn object_status(
    snapshot: &StateSnapshot,
    final_stage: Option<&str>,
    tier1_stage: Option<&str>,
) -> ObjectStatus {
    let is_final = match final_stage {
        Some(stage) => snapshot.is_approved(stage),
        None => snapshot.is_final,
    };
    let tier1 = match tier1_stage {
        Some(stage) => snapshot.is_approved(stage),
        None => !snapshot.approved_stages.is_empty(),
    };

    let code = if snapshot.explicit_locked {
        StatusCode::Locked
    } else if snapshot.rejected {
        StatusCode::Rejected
    } else if is_final {
        StatusCode::Final
    } else if tier1 {
        StatusCode::ApprovedTier1
    } else if snapshot.submitted {
        StatusCode::Submitted
    } else {
        StatusCode::Draft
    };

    code.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use hankosign_core::TargetRef;

    fn sig(id: i64, verb: Verb, stage: &str, secs: i64) -> Signature {
        Signature {
            id,
            signatory_id: 1,
            target: TargetRef::new("finance.paymentplan", "1").unwrap(),
            verb,
            stage: stage.to_string(),
            scope: "finance.paymentplan".to_string(),
            repeatable: false,
            at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs),
            note: String::new(),
            payload: serde_json::json!({}),
            client_ip: None,
            attestation: String::new(),
        }
    }

    fn required(stages: &[&str]) -> BTreeSet<String> {
        stages.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_is_draft() {
        let snapshot = project(&[], required(&["WIREF", "CHAIR"]));
        assert!(!snapshot.submitted);
        assert!(!snapshot.locked);
        assert!(!snapshot.is_final);
        assert_eq!(object_status(&snapshot, None, None).code, StatusCode::Draft);
        assert_eq!(object_status(&snapshot, None, None).label, "Draft");
    }

    #[test]
    fn test_submit_then_withdraw() {
        let sigs = vec![sig(1, Verb::Submit, "", 0), sig(2, Verb::Withdraw, "", 5)];
        let snapshot = project(&sigs, BTreeSet::new());
        assert!(!snapshot.submitted);
        assert!(!snapshot.locked);

        let sigs = vec![
            sig(1, Verb::Submit, "", 0),
            sig(2, Verb::Withdraw, "", 5),
            sig(3, Verb::Submit, "", 9),
        ];
        let snapshot = project(&sigs, BTreeSet::new());
        assert!(snapshot.submitted);
        assert!(snapshot.locked);
    }

    #[test]
    fn test_equal_timestamps_fall_back_to_id() {
        let sigs = vec![sig(2, Verb::Unlock, "", 0), sig(3, Verb::Lock, "", 0)];
        assert!(project(&sigs, BTreeSet::new()).explicit_locked);

        let sigs = vec![sig(3, Verb::Unlock, "", 0), sig(2, Verb::Lock, "", 0)];
        assert!(!project(&sigs, BTreeSet::new()).explicit_locked);
    }

    #[test]
    fn test_final_needs_required_stages() {
        let sigs = vec![sig(1, Verb::Approve, "WIREF", 0)];
        assert!(!project(&sigs, BTreeSet::new()).is_final);
        assert!(project(&sigs, required(&["WIREF"])).is_final);
        assert!(!project(&sigs, required(&["WIREF", "CHAIR"])).is_final);
    }

    #[test]
    fn test_stageless_approve_not_counted() {
        let sigs = vec![sig(1, Verb::Approve, "", 0)];
        let snapshot = project(&sigs, BTreeSet::new());
        assert!(snapshot.approved_stages.is_empty());
        assert!(!snapshot.locked);
    }

    #[test]
    fn test_status_progression() {
        let req = required(&["WIREF", "CHAIR"]);
        let mut sigs = vec![sig(1, Verb::Submit, "", 0)];
        let status = |sigs: &[Signature]| {
            object_status(&project(sigs, req.clone()), Some("CHAIR"), Some("WIREF")).code
        };

        assert_eq!(status(&sigs), StatusCode::Submitted);

        sigs.push(sig(2, Verb::Approve, "WIREF", 1));
        assert_eq!(status(&sigs), StatusCode::ApprovedTier1);

        sigs.push(sig(3, Verb::Approve, "CHAIR", 2));
        assert_eq!(status(&sigs), StatusCode::Final);

        sigs.push(sig(4, Verb::Reject, "", 3));
        assert_eq!(status(&sigs), StatusCode::Rejected);

        sigs.push(sig(5, Verb::Lock, "", 4));
        assert_eq!(status(&sigs), StatusCode::Locked);

        sigs.push(sig(6, Verb::Unlock, "", 5));
        assert_eq!(status(&sigs), StatusCode::Rejected);
    }

    #[test]
    fn test_status_defaults_without_stage_names() {
        let sigs = vec![sig(1, Verb::Approve, "WIREF", 0)];
        let snapshot = project(&sigs, required(&["WIREF", "CHAIR"]));
        assert_eq!(object_status(&snapshot, None, None).code, StatusCode::ApprovedTier1);

        let snapshot = project(&sigs, required(&["WIREF"]));
        assert_eq!(object_status(&snapshot, None, None).code, StatusCode::Final);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::ApprovedTier1.to_string(), "approved-tier1");
        assert_eq!(StatusCode::ApprovedTier1.label(), "Approved (tier 1)");
        assert_eq!("draft".parse::<StatusCode>().unwrap(), StatusCode::Draft);
    }
}
