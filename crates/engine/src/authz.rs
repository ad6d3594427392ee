//! Authorization engine
//!
//! Read-only check of whether a principal may perform an action on a
//! target. Steps run in order and the first failing one decides:
//!
//! 1. the action exists in the catalog for the target's type
//! 2. the principal has an active signatory (newest update wins)
//! 3. that signatory is verified
//! 4. a policy grants the action to the signatory's role
//! 5. separation of duties, when the action requires it
//!
//! A denial is a value ([`Decision`]), not an error. Only storage faults
//! come back as `Err`. Step 5 is repeated inside the ledger write, where it
//! cannot race another append.

use crate::error::EngineResult;
use hankosign_catalog::{Action, Catalog, CatalogError, Policy};
use hankosign_core::TargetRef;
use hankosign_ledger::Ledger;
use hankosign_signatory::{Signatory, SignatoryRegistry};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use tracing::debug;

/// Why an action was refused
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
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    UnknownAction,
    NoSignatory,
    Unverified,
    Unauthorized,
    DistinctSignerRequired,
}

impl DenialReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        self.into()
    }

    /// Human-readable explanation
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::UnknownAction => "Action is not defined for this object type",
            DenialReason::NoSignatory => "No active signatory for this principal",
            DenialReason::Unverified => "Signatory is not verified",
            DenialReason::Unauthorized => {
                "No policy grants this action to the signatory's role"
            }
            DenialReason::DistinctSignerRequired => {
                "This signatory already signed another step on this object"
            }
        }
    }
}

/// How a caller names the action to check
#[derive(Debug, Clone, Copy)]
pub enum ActionRef<'a> {
    Action(&'a Action),
    /// External form, `VERB:STAGE@scope`
    Code(&'a str),
}

impl<'a> From<&'a Action> for ActionRef<'a> {
    fn from(action: &'a Action) -> Self {
        ActionRef::Action(action)
    }
}

impl<'a> From<&'a str> for ActionRef<'a> {
    fn from(code: &'a str) -> Self {
        ActionRef::Code(code)
    }
}

impl<'a> From<&'a String> for ActionRef<'a> {
    fn from(code: &'a String) -> Self {
        ActionRef::Code(code.as_str())
    }
}

/// Outcome of an authorization check
///
/// Everything resolved before the first failing step is filled in.
#[derive(Debug, Clone)]
pub struct Decision {
    /// `None` when allowed
    pub reason: Option<DenialReason>,
    pub signatory: Option<Signatory>,
    pub action: Option<Action>,
    pub policy: Option<Policy>,
}

impl Decision {
    fn deny(reason: DenialReason) -> Self {
        Self {
            reason: Some(reason),
            signatory: None,
            action: None,
            policy: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.reason.is_none()
    }
}

/// Run the authorization steps
pub(crate) fn evaluate(
    catalog: &Catalog,
    registry: &SignatoryRegistry,
    ledger: &Ledger,
    principal: &str,
    action_ref: ActionRef<'_>,
    target: &TargetRef,
) -> EngineResult<Decision> {
    let action = match action_ref {
        ActionRef::Action(action) => catalog.action(&action.code),
        ActionRef::Code(code) => match catalog.resolve(code) {
            Ok(action) => Some(action),
            Err(CatalogError::UnknownAction(_)) => None,
            Err(e) => return Err(e.into()),
        },
    };
    let Some(action) = action else {
        return Ok(Decision::deny(DenialReason::UnknownAction));
    };

    // An action only exists for the target type it is scoped to
    if action.scope() != target.type_name {
        debug!(
            action = %action.code,
            target = %target,
            "Action scope does not match target type"
        );
        return Ok(Decision::deny(DenialReason::UnknownAction));
    }

    let mut decision = Decision::deny(DenialReason::NoSignatory);
    decision.action = Some(action.clone());

    let Some(signatory) = registry.resolve_active(principal)? else {
        return Ok(decision);
    };

    let signatory_id = signatory.id;
    let role = signatory.role.clone();
    let verified = signatory.verified;
    decision.signatory = Some(signatory);

    if !verified {
        decision.reason = Some(DenialReason::Unverified);
        return Ok(decision);
    }

    let Some(policy) = catalog.policy_for(&role, &action.code) else {
        decision.reason = Some(DenialReason::Unauthorized);
        return Ok(decision);
    };
    decision.policy = Some(policy.clone());

    if action.requires_distinct_signer()
        && ledger.signed_in_scope(signatory_id, target, action.scope())?
    {
        debug!(
            action = %action.code,
            target = %target,
            signatory = signatory_id,
            "Distinct signer required"
        );
        decision.reason = Some(DenialReason::DistinctSignerRequired);
        return Ok(decision);
    }

    decision.reason = None;
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hankosign_catalog::ActionFlags;
    use hankosign_core::ActionCode;
    use hankosign_ledger::SignatureDraft;

    struct Fixture {
        catalog: Catalog,
        registry: SignatoryRegistry,
        ledger: Ledger,
    }

    fn fixture() -> Fixture {
        let mut catalog = Catalog::new();
        catalog
            .define_action(
                "SUBMIT:-@finance.paymentplan".parse().unwrap(),
                ActionFlags::default(),
                "",
            )
            .unwrap();
        catalog
            .define_action(
                "APPROVE:WIREF@finance.paymentplan".parse().unwrap(),
                ActionFlags::distinct_signer(),
                "",
            )
            .unwrap();
        catalog
            .define_action(
                "APPROVE:CHAIR@finance.paymentplan".parse().unwrap(),
                ActionFlags::distinct_signer(),
                "",
            )
            .unwrap();
        catalog
            .grant_policy(
                "treasurer",
                [
                    "SUBMIT:-@finance.paymentplan",
                    "APPROVE:WIREF@finance.paymentplan",
                    "APPROVE:CHAIR@finance.paymentplan",
                ]
                .iter()
                .map(|c| c.parse::<ActionCode>().unwrap()),
                "",
            )
            .unwrap();

        Fixture {
            catalog,
            registry: SignatoryRegistry::in_memory().unwrap(),
            ledger: Ledger::in_memory().unwrap(),
        }
    }

    fn target() -> TargetRef {
        TargetRef::new("finance.paymentplan", "1").unwrap()
    }

    fn check(f: &Fixture, principal: &str, code: &str) -> Decision {
        evaluate(&f.catalog, &f.registry, &f.ledger, principal, code.into(), &target()).unwrap()
    }

    #[test]
    fn test_unknown_action() {
        let f = fixture();
        let decision = check(&f, "alice", "RELEASE:-@finance.paymentplan");
        assert_eq!(decision.reason, Some(DenialReason::UnknownAction));

        let decision = check(&f, "alice", "garbage");
        assert_eq!(decision.reason, Some(DenialReason::UnknownAction));
    }

    #[test]
    fn test_action_scoped_to_other_type() {
        let f = fixture();
        let sig = f.registry.enroll("bob", "treasurer", "Bob").unwrap();
        f.registry.set_verified(sig.id, true).unwrap();

        let session = TargetRef::new("assembly.session", "1").unwrap();
        let decision = evaluate(
            &f.catalog,
            &f.registry,
            &f.ledger,
            "bob",
            "SUBMIT:-@finance.paymentplan".into(),
            &session,
        )
        .unwrap();
        assert_eq!(decision.reason, Some(DenialReason::UnknownAction));
        assert!(decision.signatory.is_none());

        assert!(check(&f, "bob", "SUBMIT:-@finance.paymentplan").is_allowed());
    }

    #[test]
    fn test_steps_in_order() {
        let f = fixture();
        let code = "SUBMIT:-@finance.paymentplan";

        assert_eq!(check(&f, "alice", code).reason, Some(DenialReason::NoSignatory));

        let sig = f.registry.enroll("alice", "auditor", "Alice").unwrap();
        let decision = check(&f, "alice", code);
        assert_eq!(decision.reason, Some(DenialReason::Unverified));
        assert!(decision.signatory.is_some());

        f.registry.set_verified(sig.id, true).unwrap();
        assert_eq!(check(&f, "alice", code).reason, Some(DenialReason::Unauthorized));

        let sig = f.registry.enroll("bob", "treasurer", "Bob").unwrap();
        f.registry.set_verified(sig.id, true).unwrap();
        let decision = check(&f, "bob", code);
        assert!(decision.is_allowed());
        assert!(decision.policy.is_some());
        assert_eq!(decision.action.unwrap().code.to_string(), code);
    }

    #[test]
    fn test_action_ref_by_value() {
        let f = fixture();
        let sig = f.registry.enroll("bob", "treasurer", "Bob").unwrap();
        f.registry.set_verified(sig.id, true).unwrap();

        let code: ActionCode = "SUBMIT:-@finance.paymentplan".parse().unwrap();
        let action = f.catalog.action(&code).unwrap();
        let decision =
            evaluate(&f.catalog, &f.registry, &f.ledger, "bob", action.into(), &target()).unwrap();
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_distinct_signer() {
        let f = fixture();
        let sig = f.registry.enroll("bob", "treasurer", "Bob").unwrap();
        f.registry.set_verified(sig.id, true).unwrap();

        f.ledger
            .append(
                SignatureDraft {
                    signatory_id: sig.id,
                    target: target(),
                    action: "APPROVE:WIREF@finance.paymentplan".parse().unwrap(),
                    repeatable: false,
                    distinct_signer: true,
                    note: String::new(),
                    payload: serde_json::json!({}),
                    client_ip: None,
                    attestation: "x".to_string(),
                },
                chrono::Duration::seconds(10),
            )
            .unwrap();

        let decision = check(&f, "bob", "APPROVE:CHAIR@finance.paymentplan");
        assert_eq!(decision.reason, Some(DenialReason::DistinctSignerRequired));

        // Flag only applies to actions that carry it
        assert!(check(&f, "bob", "SUBMIT:-@finance.paymentplan").is_allowed());
    }

    #[test]
    fn test_denial_codes() {
        assert_eq!(DenialReason::DistinctSignerRequired.code(), "distinct_signer_required");
        assert_eq!(DenialReason::NoSignatory.to_string(), "no_signatory");
        assert_eq!("unverified".parse::<DenialReason>().unwrap(), DenialReason::Unverified);
    }
}
