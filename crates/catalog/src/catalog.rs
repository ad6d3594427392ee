//! The action/policy catalog

use crate::action::{Action, ActionFlags};
use crate::error::{CatalogError, CatalogResult};
use crate::manifest::{ActionDef, CatalogManifest, PolicyDef};
use crate::policy::Policy;
use chrono::Utc;
use hankosign_core::{ActionCode, Verb};
use std::collections::{BTreeMap, BTreeSet};

/// Result of synchronizing action definitions into a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<ActionCode>,
    pub updated: Vec<ActionCode>,
    pub unchanged: Vec<ActionCode>,
    /// Definitions whose flags differ from the stored action
    pub conflicts: Vec<ActionCode>,
}

/// Registry of actions and role grants
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    actions: BTreeMap<ActionCode, Action>,
    policies: Vec<Policy>,
    next_policy_id: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a manifest (actions first, then grants)
    pub fn from_manifest(manifest: &CatalogManifest) -> CatalogResult<Self> {
        let mut catalog = Catalog::new();
        for def in &manifest.actions {
            catalog.define_from(def)?;
        }
        for def in &manifest.policies {
            let codes = def
                .actions
                .iter()
                .map(|code| code.parse::<ActionCode>())
                .collect::<Result<Vec<_>, _>>()?;
            catalog.grant_policy(&def.role, codes, &def.notes)?;
        }
        Ok(catalog)
    }

    /// Export the catalog as a manifest
    pub fn to_manifest(&self) -> CatalogManifest {
        CatalogManifest {
            actions: self
                .actions
                .values()
                .map(|action| ActionDef {
                    verb: action.verb(),
                    stage: action.stage().to_string(),
                    scope: action.scope().to_string(),
                    human_label: action.human_label.clone(),
                    comment: action.comment.clone(),
                    repeatable: action.flags.repeatable,
                    require_distinct_signer: action.flags.require_distinct_signer,
                })
                .collect(),
            policies: self
                .policies
                .iter()
                .map(|policy| PolicyDef {
                    role: policy.role.clone(),
                    actions: policy.actions.iter().map(|c| c.to_string()).collect(),
                    notes: policy.notes.clone(),
                })
                .collect(),
        }
    }

    // === Actions ===

    /// Define a new action; the `(verb, stage, scope)` tuple must be new
    pub fn define_action(
        &mut self,
        code: ActionCode,
        flags: ActionFlags,
        human_label: impl Into<String>,
    ) -> CatalogResult<&Action> {
        if self.actions.contains_key(&code) {
            return Err(CatalogError::DuplicateAction(code));
        }

        let mut human_label = human_label.into();
        if human_label.trim().is_empty() {
            human_label = code.verb.label().to_string();
        }

        tracing::debug!(action = %code, "Defining action");
        Ok(self
            .actions
            .entry(code.clone())
            .or_insert_with(|| Action::new(code, flags, human_label)))
    }

    fn define_from(&mut self, def: &ActionDef) -> CatalogResult<&Action> {
        let code = ActionCode::new(def.verb, &def.stage, &def.scope)?;
        let flags = ActionFlags {
            repeatable: def.repeatable,
            require_distinct_signer: def.require_distinct_signer,
        };
        let comment = def.comment.clone();
        self.define_action(code.clone(), flags, def.human_label.clone())?;
        self.update_action_labels(&code, None, Some(comment))
    }

    /// Change housekeeping fields of an action
    pub fn update_action_labels(
        &mut self,
        code: &ActionCode,
        human_label: Option<String>,
        comment: Option<String>,
    ) -> CatalogResult<&Action> {
        let action = self
            .actions
            .get_mut(code)
            .ok_or_else(|| CatalogError::UnknownAction(code.to_string()))?;

        let mut changed = false;
        if let Some(label) = human_label {
            if label != action.human_label {
                action.human_label = label;
                changed = true;
            }
        }
        if let Some(comment) = comment {
            if comment != action.comment {
                action.comment = comment;
                changed = true;
            }
        }
        if changed {
            action.updated_at = Utc::now();
        }

        Ok(action)
    }

    /// Look up an action by its identity tuple
    pub fn action(&self, code: &ActionCode) -> Option<&Action> {
        self.actions.get(code)
    }

    /// Parse an action code string and look the action up
    pub fn resolve(&self, code: &str) -> CatalogResult<&Action> {
        let parsed: ActionCode = code
            .parse()
            .map_err(|_| CatalogError::UnknownAction(code.to_string()))?;
        self.action(&parsed)
            .ok_or_else(|| CatalogError::UnknownAction(parsed.to_string()))
    }

    /// All actions, ordered by code
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    /// Stages that must be approved for a target type to become final
    pub fn required_stages(&self, scope: &str) -> BTreeSet<String> {
        self.actions
            .values()
            .filter(|a| a.verb() == Verb::Approve && a.scope() == scope && !a.stage().is_empty())
            .map(|a| a.stage().to_string())
            .collect()
    }

    /// Create or refresh actions from definitions.
    ///
    /// Labels and comments are refreshed; differing flags are reported as
    /// conflicts and left untouched. With `dry_run` nothing is written.
    pub fn sync_actions(&mut self, defs: &[ActionDef], dry_run: bool) -> CatalogResult<SyncReport> {
        let mut report = SyncReport::default();

        for def in defs {
            let code = ActionCode::new(def.verb, &def.stage, &def.scope)?;

            if !self.actions.contains_key(&code) {
                if !dry_run {
                    self.define_from(def)?;
                }
                report.created.push(code);
                continue;
            }
            let existing = &self.actions[&code];

            if existing.flags.repeatable != def.repeatable
                || existing.flags.require_distinct_signer != def.require_distinct_signer
            {
                tracing::warn!(
                    action = %code,
                    "Action flags differ from manifest; flags are immutable and were kept"
                );
                report.conflicts.push(code.clone());
            }

            if existing.human_label == def.human_label && existing.comment == def.comment {
                report.unchanged.push(code);
                continue;
            }

            if !dry_run {
                self.update_action_labels(
                    &code,
                    Some(def.human_label.clone()),
                    Some(def.comment.clone()),
                )?;
            }
            report.updated.push(code);
        }

        Ok(report)
    }

    // === Policies ===

    /// Grant a set of actions to a role
    pub fn grant_policy(
        &mut self,
        role: &str,
        actions: impl IntoIterator<Item = ActionCode>,
        notes: &str,
    ) -> CatalogResult<&Policy> {
        let role = role.trim();
        let invalid = |reason: String| CatalogError::InvalidGrant {
            role: role.to_string(),
            reason,
        };

        if role.is_empty() {
            return Err(invalid("role must not be empty".to_string()));
        }

        let actions: BTreeSet<ActionCode> = actions.into_iter().collect();
        if actions.is_empty() {
            return Err(invalid("grant set is empty".to_string()));
        }
        if let Some(unknown) = actions.iter().find(|code| !self.actions.contains_key(code)) {
            return Err(invalid(format!("action {} is not defined", unknown)));
        }
        if self
            .policies
            .iter()
            .any(|p| p.role == role && p.actions == actions)
        {
            return Err(invalid("an identical grant already exists".to_string()));
        }

        self.next_policy_id += 1;
        let now = Utc::now();
        let policy = Policy {
            id: self.next_policy_id,
            role: role.to_string(),
            actions,
            notes: notes.to_string(),
            created_at: now,
            updated_at: now,
        };

        tracing::debug!(
            policy = policy.id,
            role = %policy.role,
            grants = policy.actions.len(),
            "Granting policy"
        );
        let index = self.policies.len();
        self.policies.push(policy);
        Ok(&self.policies[index])
    }

    /// Change the notes of a policy
    pub fn update_policy_notes(&mut self, id: u64, notes: &str) -> CatalogResult<&Policy> {
        let policy = self
            .policies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CatalogError::PolicyNotFound(id))?;

        if policy.notes != notes {
            policy.notes = notes.to_string();
            policy.updated_at = Utc::now();
        }
        Ok(policy)
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// The preferred policy granting `code` to `role`, if any
    pub fn policy_for(&self, role: &str, code: &ActionCode) -> Option<&Policy> {
        self.policies
            .iter()
            .filter(|p| p.role == role && p.grants(code))
            .max_by(|a, b| a.preference(b))
    }

    /// Grant every manifest policy that has no identical grant yet.
    ///
    /// Returns the roles that were (or, with `dry_run`, would be) granted.
    pub fn sync_policies(
        &mut self,
        defs: &[PolicyDef],
        dry_run: bool,
    ) -> CatalogResult<Vec<String>> {
        let mut granted = Vec::new();

        for def in defs {
            let codes = def
                .actions
                .iter()
                .map(|code| code.parse::<ActionCode>())
                .collect::<Result<BTreeSet<_>, _>>()?;
            let role = def.role.trim();

            if self.policies.iter().any(|p| p.role == role && p.actions == codes) {
                continue;
            }
            if !dry_run {
                self.grant_policy(role, codes, &def.notes)?;
            }
            granted.push(role.to_string());
        }

        Ok(granted)
    }
}
