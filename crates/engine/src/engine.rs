//! HankoSign engine - main orchestrator
//!
//! Coordinates authorization, attestation, ledger writes and the read-only
//! projections over the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hankosign_catalog::{Action, Catalog};
use hankosign_core::{normalize_stage, TargetRef, TargetRegistry, Verb};
use hankosign_ledger::{
    attestation_digest, verify_attestation, Appended, Ledger, Signature, SignatureDraft,
};
use hankosign_signatory::{Keystore, RegistryError, SignatoryRegistry};
use tracing::{debug, info, warn};

use crate::authz::{self, ActionRef, Decision, DenialReason};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::idempotency::{idempotency_key, KeyValueStore, MemoryStore};
use crate::projector::{self, ObjectStatus, StateSnapshot};
use crate::request::SignRequest;
use crate::seal::{AuditMismatch, AuditReport, SealLine};
use crate::stats::{Counters, EngineStats, Outcome};

/// Main HankoSign engine
///
/// Holds:
/// - the catalog (immutable once built)
/// - the signatory registry and the keystore for signer secrets
/// - the signature ledger
/// - the idempotency store used by `sign_once`
/// - optional per-type target lookups
pub struct HankoSign {
    catalog: Arc<Catalog>,
    registry: Arc<SignatoryRegistry>,
    keystore: Arc<dyn Keystore>,
    ledger: Arc<Ledger>,
    idempotency: Arc<dyn KeyValueStore>,
    targets: TargetRegistry,
    config: EngineConfig,
    counters: Counters,
}

impl HankoSign {
    /// Create an engine; signer secrets come from the registry itself
    pub fn new(
        catalog: impl Into<Arc<Catalog>>,
        registry: Arc<SignatoryRegistry>,
        ledger: Arc<Ledger>,
        config: EngineConfig,
    ) -> Self {
        if config.service_secret.is_empty() {
            warn!("Service secret is empty; recording is refused until one is configured");
        }

        Self {
            catalog: catalog.into(),
            keystore: registry.clone(),
            registry,
            ledger,
            idempotency: Arc::new(MemoryStore::new()),
            targets: TargetRegistry::new(),
            config,
            counters: Counters::default(),
        }
    }

    /// Create an engine over in-memory stores (for testing)
    pub fn in_memory(catalog: Catalog, config: EngineConfig) -> EngineResult<Self> {
        Ok(Self::new(
            catalog,
            Arc::new(SignatoryRegistry::in_memory()?),
            Arc::new(Ledger::in_memory()?),
            config,
        ))
    }

    /// Use a different source of signer secrets
    pub fn with_keystore(mut self, keystore: Arc<dyn Keystore>) -> Self {
        self.keystore = keystore;
        self
    }

    /// Use a shared idempotency store instead of the in-process one
    pub fn with_idempotency_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.idempotency = store;
        self
    }

    /// Install per-type existence lookups
    pub fn with_targets(mut self, targets: TargetRegistry) -> Self {
        self.targets = targets;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn registry(&self) -> &SignatoryRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Authorization ===

    /// Whether `principal` may perform the action on `target`
    pub fn can_act<'a>(
        &self,
        principal: &str,
        action_ref: impl Into<ActionRef<'a>>,
        target: &TargetRef,
    ) -> EngineResult<Decision> {
        authz::evaluate(
            &self.catalog,
            &self.registry,
            &self.ledger,
            principal,
            action_ref.into(),
            target,
        )
    }

    // === Recording ===

    /// Authorize, attest and append a signature
    pub fn record<'a>(
        &self,
        principal: &str,
        action_ref: impl Into<ActionRef<'a>>,
        target: &TargetRef,
        request: SignRequest,
    ) -> EngineResult<Signature> {
        self.require_service_secret()?;

        let decision = self.can_act(principal, action_ref, target)?;
        let (action, signatory) = match (decision.reason, decision.action, decision.signatory) {
            (None, Some(action), Some(signatory)) => (action, signatory),
            (reason, action, _) => {
                let reason = reason.unwrap_or(DenialReason::Unauthorized);
                self.counters.count(Outcome::Denied);
                warn!(
                    action = %action.as_ref().map(|a| a.code.to_string()).unwrap_or_default(),
                    target = %target,
                    principal,
                    reason = reason.code(),
                    "Signature denied"
                );
                return Err(EngineError::Denied(reason));
            }
        };

        if self.targets.resolve(target) == Some(false) {
            return Err(EngineError::TargetNotFound(target.clone()));
        }

        let signer_secret = self.keystore.signer_secret(signatory.id)?;
        let attestation = attestation_digest(
            &self.config.service_secret,
            &signer_secret,
            action.verb(),
            action.stage(),
            target,
        );

        let draft = SignatureDraft {
            signatory_id: signatory.id,
            target: target.clone(),
            action: action.code.clone(),
            repeatable: action.is_repeatable(),
            distinct_signer: action.requires_distinct_signer(),
            note: request.note,
            payload: request.payload,
            client_ip: request.meta.client_ip(),
            attestation,
        };

        match self.ledger.append(draft, self.config.dedupe_window()) {
            Ok(Appended::Created(signature)) => {
                self.counters.count(Outcome::Created);
                info!(
                    action = %action.code,
                    target = %target,
                    signatory = signatory.id,
                    signature_id = signature.id,
                    outcome = "created",
                    "Signature recorded"
                );
                Ok(signature)
            }
            Ok(Appended::Deduplicated(signature)) => {
                self.counters.count(Outcome::Deduplicated);
                debug!(
                    action = %action.code,
                    target = %target,
                    signatory = signatory.id,
                    signature_id = signature.id,
                    outcome = "deduplicated",
                    "Signature deduplicated"
                );
                Ok(signature)
            }
            Err(e) => {
                let err = EngineError::from(e);
                match &err {
                    EngineError::AlreadyPerformed { .. } => {
                        self.counters.count(Outcome::AlreadyPerformed);
                    }
                    EngineError::Denied(reason) => {
                        self.counters.count(Outcome::Denied);
                        warn!(
                            action = %action.code,
                            target = %target,
                            principal,
                            reason = reason.code(),
                            "Signature denied"
                        );
                    }
                    _ => {}
                }
                Err(err)
            }
        }
    }

    /// Record at most once per `request_id` within the idempotency window.
    ///
    /// Repeat calls return the latest signature for the same
    /// `(target, verb, stage)` without recording again.
    pub fn sign_once<'a>(
        &self,
        principal: &str,
        action_ref: impl Into<ActionRef<'a>>,
        target: &TargetRef,
        request_id: &str,
        request: SignRequest,
    ) -> EngineResult<Signature> {
        self.require_service_secret()?;

        let action = self.resolve_action(action_ref.into())?;
        let key = idempotency_key(&action.code, principal, target, request_id);

        if self
            .idempotency
            .add_if_absent(&key, self.config.idempotency_window())?
        {
            let result = self.record(principal, action, target, request);
            if result.is_err() {
                if let Err(e) = self.idempotency.remove(&key) {
                    warn!(error = %e, "Failed to release idempotency key");
                }
            }
            return result;
        }

        match self.ledger.latest(target, action.verb(), action.stage())? {
            Some(signature) => {
                self.counters.count(Outcome::IdempotentHit);
                debug!(
                    action = %action.code,
                    target = %target,
                    signature_id = signature.id,
                    outcome = "idempotent",
                    "Repeated sign_once request"
                );
                Ok(signature)
            }
            None => Err(EngineError::InFlight),
        }
    }

    fn require_service_secret(&self) -> EngineResult<()> {
        if self.config.service_secret.is_empty() {
            return Err(EngineError::MissingServiceSecret);
        }
        Ok(())
    }

    fn resolve_action(&self, action_ref: ActionRef<'_>) -> EngineResult<&Action> {
        let code = match action_ref {
            ActionRef::Action(action) => self.catalog.action(&action.code),
            ActionRef::Code(code) => self.catalog.resolve(code).ok(),
        };
        code.ok_or(EngineError::Denied(DenialReason::UnknownAction))
    }

    // === Projection ===

    /// Derived workflow state of a target
    pub fn state_snapshot(&self, target: &TargetRef) -> EngineResult<StateSnapshot> {
        let signatures = self.ledger.for_target(target)?;
        Ok(projector::project(
            &signatures,
            self.catalog.required_stages(&target.type_name),
        ))
    }

    /// Prioritized single status of a target
    pub fn object_status(
        &self,
        target: &TargetRef,
        final_stage: Option<&str>,
        tier1_stage: Option<&str>,
    ) -> EngineResult<ObjectStatus> {
        let snapshot = self.state_snapshot(target)?;
        let final_stage = final_stage.map(normalize_stage);
        let tier1_stage = tier1_stage.map(normalize_stage);
        Ok(projector::object_status(
            &snapshot,
            final_stage.as_deref(),
            tier1_stage.as_deref(),
        ))
    }

    // === Queries ===

    /// All signatures on a target, oldest first
    pub fn history(&self, target: &TargetRef) -> EngineResult<Vec<Signature>> {
        Ok(self.ledger.for_target(target)?)
    }

    pub fn has_signature(
        &self,
        target: &TargetRef,
        verb: Verb,
        stage: &str,
    ) -> EngineResult<bool> {
        Ok(self.ledger.has_signature(target, verb, &normalize_stage(stage))?)
    }

    pub fn first_signed_at(
        &self,
        target: &TargetRef,
        verb: Verb,
        stage: &str,
    ) -> EngineResult<Option<DateTime<Utc>>> {
        Ok(self.ledger.first_signed_at(target, verb, &normalize_stage(stage))?)
    }

    /// Signature box for a target, oldest first
    pub fn seals(&self, target: &TargetRef) -> EngineResult<Vec<SealLine>> {
        let signatures = self.ledger.for_target(target)?;
        let mut names: HashMap<i64, String> = HashMap::new();
        let mut lines = Vec::with_capacity(signatures.len());

        for signature in &signatures {
            if !names.contains_key(&signature.signatory_id) {
                let name = match self.registry.get(signature.signatory_id) {
                    Ok(signatory) => signatory.display_name,
                    Err(RegistryError::NotFound(id)) => format!("signatory #{}", id),
                    Err(e) => return Err(e.into()),
                };
                names.insert(signature.signatory_id, name);
            }
            let who = names.get(&signature.signatory_id).cloned().unwrap_or_default();
            lines.push(SealLine::new(signature, who, self.config.seal_prefix_len));
        }

        Ok(lines)
    }

    /// Recompute attestations for one target, or the whole ledger
    pub fn audit(&self, target: Option<&TargetRef>) -> EngineResult<AuditReport> {
        let signatures = match target {
            Some(target) => self.ledger.for_target(target)?,
            None => self.ledger.all()?,
        };

        let mut report = AuditReport::default();
        for signature in &signatures {
            report.checked += 1;

            let reason = match self.keystore.signer_secret(signature.signatory_id) {
                Ok(secret) => {
                    let valid = verify_attestation(
                        &signature.attestation,
                        &self.config.service_secret,
                        &secret,
                        signature.verb,
                        &signature.stage,
                        &signature.target,
                    );
                    (!valid).then(|| "digest does not match".to_string())
                }
                Err(e) => Some(format!("signer secret unavailable: {}", e)),
            };

            if let Some(reason) = reason {
                warn!(
                    signature_id = signature.id,
                    target = %signature.target,
                    %reason,
                    "Attestation audit failed"
                );
                report.mismatches.push(AuditMismatch {
                    signature_id: signature.id,
                    target: signature.target.clone(),
                    action: signature.short_code(),
                    reason,
                });
            }
        }

        info!(
            checked = report.checked,
            mismatches = report.mismatches.len(),
            "Attestation audit finished"
        );
        Ok(report)
    }

    /// Recording counters since the engine was built
    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }
}
