//! CLI commands

use std::path::Path;

use hankosign_catalog::{Action, ActionFlags, CatalogManifest, Policy, SyncReport};
use hankosign_core::{ActionCode, SecretKey, TargetRef};
use hankosign_engine::{
    AuditReport, Decision, ObjectStatus, RequestMeta, SealLine, SignRequest, StateSnapshot,
};
use hankosign_ledger::Signature;
use hankosign_signatory::Signatory;

use crate::context::AppContext;

/// Initialize a data directory with a fresh service secret
pub fn init(ctx: &mut AppContext) -> Result<(), anyhow::Error> {
    if ctx.is_initialized() {
        anyhow::bail!(
            "Data directory already initialized ({})",
            ctx.config_path().display()
        );
    }

    if ctx.config.service_secret.is_empty() {
        ctx.config.service_secret = SecretKey::generate();
    }
    ctx.save_config()?;
    ctx.save_catalog()?;

    println!("✅ Initialized {}", ctx.data_path().display());
    if ctx.secret_from_env() {
        println!(
            "   Service secret taken from {} (not stored)",
            hankosign_engine::SERVICE_SECRET_ENV
        );
    }
    Ok(())
}

/// Generate a new service secret
pub fn keygen(output: Option<&Path>) -> Result<SecretKey, anyhow::Error> {
    let secret = SecretKey::generate();

    println!("✅ Generated service secret");
    if let Some(output) = output {
        std::fs::write(output, secret.expose())?;
        println!("   Saved to: {}", output.display());
    }
    println!();
    println!("To use: export {}={}", hankosign_engine::SERVICE_SECRET_ENV, secret.expose());
    Ok(secret)
}

// === Catalog ===

/// Define a new action
pub fn define_action(
    ctx: &mut AppContext,
    code: &str,
    flags: ActionFlags,
    label: &str,
    comment: Option<&str>,
) -> Result<Action, anyhow::Error> {
    let code: ActionCode = code.parse()?;
    ctx.catalog.define_action(code.clone(), flags, label)?;
    let action = match comment {
        Some(comment) => ctx.catalog.update_action_labels(&code, None, Some(comment.to_string()))?,
        None => ctx.catalog.resolve(&code.to_string())?,
    }
    .clone();
    ctx.save_catalog()?;

    println!("✅ Defined {}", action);
    Ok(action)
}

/// Grant actions to a role
pub fn grant(
    ctx: &mut AppContext,
    role: &str,
    codes: &[String],
    notes: &str,
) -> Result<Policy, anyhow::Error> {
    let codes = codes
        .iter()
        .map(|code| code.parse::<ActionCode>())
        .collect::<Result<Vec<_>, _>>()?;
    let policy = ctx.catalog.grant_policy(role, codes, notes)?.clone();
    ctx.save_catalog()?;

    println!(
        "✅ Granted {} action(s) to '{}' (policy #{})",
        policy.actions.len(),
        policy.role,
        policy.id
    );
    Ok(policy)
}

/// Synchronize a manifest into the catalog
pub fn sync(
    ctx: &mut AppContext,
    manifest: &Path,
    dry_run: bool,
) -> Result<SyncReport, anyhow::Error> {
    let manifest = CatalogManifest::load(manifest)?;
    let report = ctx.catalog.sync_actions(&manifest.actions, dry_run)?;
    let granted = ctx.catalog.sync_policies(&manifest.policies, dry_run)?;

    if !dry_run {
        ctx.save_catalog()?;
    }

    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!(
        "{}Actions: {} created, {} updated, {} unchanged, {} conflicting",
        prefix,
        report.created.len(),
        report.updated.len(),
        report.unchanged.len(),
        report.conflicts.len()
    );
    for code in &report.conflicts {
        println!("   ⚠️  {} flags differ from manifest (kept)", code);
    }
    println!("{}Policies: {} granted", prefix, granted.len());
    Ok(report)
}

/// Print all actions and policies
pub fn list_catalog(ctx: &AppContext) -> Result<(), anyhow::Error> {
    println!("Actions:");
    for action in ctx.catalog.actions() {
        let mut flags = Vec::new();
        if action.is_repeatable() {
            flags.push("repeatable");
        }
        if action.requires_distinct_signer() {
            flags.push("distinct-signer");
        }
        println!(
            "  {:<40} {:<28} {}",
            action.code.to_string(),
            action.human_label,
            flags.join(",")
        );
    }

    println!("Policies:");
    for policy in ctx.catalog.policies() {
        let codes: Vec<String> = policy.actions.iter().map(|c| c.to_string()).collect();
        println!("  #{:<4} {:<16} {}", policy.id, policy.role, codes.join(" "));
    }
    Ok(())
}

// === Signatories ===

/// Enroll a principal/role as an unverified signatory
pub fn enroll(
    ctx: &AppContext,
    principal: &str,
    role: &str,
    display_name: &str,
) -> Result<Signatory, anyhow::Error> {
    let signatory = ctx.registry.enroll(principal, role, display_name)?;
    println!("✅ Enrolled signatory #{}: {}", signatory.id, signatory);
    Ok(signatory)
}

/// Mark a signatory verified (or revoke verification)
pub fn verify(ctx: &AppContext, id: i64, verified: bool) -> Result<Signatory, anyhow::Error> {
    let signatory = ctx.registry.set_verified(id, verified)?;
    println!(
        "✅ Signatory #{} {}",
        signatory.id,
        if verified { "verified" } else { "unverified" }
    );
    Ok(signatory)
}

/// Deactivate a signatory
pub fn deactivate(ctx: &AppContext, id: i64) -> Result<Signatory, anyhow::Error> {
    let signatory = ctx.registry.deactivate(id)?;
    println!("✅ Signatory #{} deactivated", signatory.id);
    Ok(signatory)
}

/// Print all signatories
pub fn list_signatories(ctx: &AppContext) -> Result<Vec<Signatory>, anyhow::Error> {
    let signatories = ctx.registry.list()?;
    for s in &signatories {
        println!(
            "  #{:<4} {:<20} {:<16} {:<24} active={} verified={}",
            s.id, s.principal_id, s.role, s.display_name, s.active, s.verified
        );
    }
    Ok(signatories)
}

// === Signing ===

/// Build a sign request from CLI options
pub fn sign_request(
    note: Option<String>,
    payload: Option<&str>,
    remote_addr: Option<String>,
    forwarded_for: Option<String>,
) -> Result<SignRequest, anyhow::Error> {
    let mut request = SignRequest::new().meta(RequestMeta {
        remote_addr,
        forwarded_for,
    });
    if let Some(note) = note {
        request = request.note(note);
    }
    if let Some(payload) = payload {
        request = request.payload(serde_json::from_str(payload)?);
    }
    Ok(request)
}

/// Check whether a principal may act
pub fn can_act(
    ctx: &AppContext,
    principal: &str,
    action: &str,
    target: &TargetRef,
) -> Result<Decision, anyhow::Error> {
    let decision = ctx.engine().can_act(principal, action, target)?;
    match decision.reason {
        None => println!("✅ {} may perform {} on {}", principal, action, target),
        Some(reason) => println!("❌ Denied ({}): {}", reason, reason.message()),
    }
    Ok(decision)
}

/// Record a signature
pub fn sign(
    ctx: &AppContext,
    principal: &str,
    action: &str,
    target: &TargetRef,
    request: SignRequest,
) -> Result<Signature, anyhow::Error> {
    let signature = ctx.engine().record(principal, action, target, request)?;
    print_signature(&signature);
    Ok(signature)
}

/// Record a signature at most once per request id
pub fn sign_once(
    ctx: &AppContext,
    principal: &str,
    action: &str,
    target: &TargetRef,
    request_id: &str,
    request: SignRequest,
) -> Result<Signature, anyhow::Error> {
    let signature = ctx.engine().sign_once(principal, action, target, request_id, request)?;
    print_signature(&signature);
    Ok(signature)
}

fn print_signature(signature: &Signature) {
    println!(
        "✅ Signature #{}: {} on {} at {}",
        signature.id,
        signature.short_code(),
        signature.target,
        signature.at.to_rfc3339()
    );
    println!("   Attestation: {}", signature.attestation);
}

// === Projections ===

/// Print the derived state of a target
pub fn snapshot(ctx: &AppContext, target: &TargetRef) -> Result<StateSnapshot, anyhow::Error> {
    let snapshot = ctx.engine().state_snapshot(target)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(snapshot)
}

/// Print the status of a target
pub fn status(
    ctx: &AppContext,
    target: &TargetRef,
    final_stage: Option<&str>,
    tier1_stage: Option<&str>,
) -> Result<ObjectStatus, anyhow::Error> {
    let status = ctx.engine().object_status(target, final_stage, tier1_stage)?;
    println!("{}: {} ({})", target, status.label, status.code);
    Ok(status)
}

/// Print the signature box of a target
pub fn seals(ctx: &AppContext, target: &TargetRef) -> Result<Vec<SealLine>, anyhow::Error> {
    let seals = ctx.engine().seals(target)?;
    if seals.is_empty() {
        println!("No signatures on {}", target);
    }
    for line in &seals {
        println!("  {}", line);
    }
    Ok(seals)
}

/// Recompute attestation digests
pub fn audit(ctx: &AppContext, target: Option<&TargetRef>) -> Result<AuditReport, anyhow::Error> {
    let report = ctx.engine().audit(target)?;
    if report.is_clean() {
        println!("✅ Attestations verified ({} signatures)", report.checked);
    } else {
        println!(
            "❌ {} of {} attestations failed",
            report.mismatches.len(),
            report.checked
        );
        for mismatch in &report.mismatches {
            println!(
                "   #{} {} on {}: {}",
                mismatch.signature_id, mismatch.action, mismatch.target, mismatch.reason
            );
        }
    }
    Ok(report)
}
