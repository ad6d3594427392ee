//! Action codes - stable external identifiers for catalog actions
//!
//! Format: VERB:STAGE@app.model
//! Example: APPROVE:WIREF@finance.paymentplan
//!
//! An empty stage is written as `-` (e.g. `SUBMIT:-@finance.paymentplan`).

use crate::error::CoreError;
use crate::verb::Verb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder for an empty stage in the external form
pub const EMPTY_STAGE: &str = "-";

/// Identity tuple of a catalog action
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionCode {
    /// Workflow verb
    pub verb: Verb,

    /// Uppercase stage code, empty for stage-less actions
    pub stage: String,

    /// Target type the action applies to (`app.model`, lowercase)
    pub scope: String,
}

impl ActionCode {
    /// Create a new ActionCode, normalizing stage and scope
    pub fn new(
        verb: Verb,
        stage: impl AsRef<str>,
        scope: impl AsRef<str>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            verb,
            stage: normalize_stage(stage.as_ref()),
            scope: normalize_scope(scope.as_ref())?,
        })
    }

    /// Stage as shown externally (`-` when empty)
    pub fn stage_display(&self) -> &str {
        if self.stage.is_empty() {
            EMPTY_STAGE
        } else {
            &self.stage
        }
    }

    pub fn has_stage(&self) -> bool {
        !self.stage.is_empty()
    }
}

/// Uppercase a stage code; `-` and blanks become the empty stage
pub fn normalize_stage(stage: &str) -> String {
    let stage = stage.trim();
    if stage == EMPTY_STAGE {
        String::new()
    } else {
        stage.to_uppercase()
    }
}

/// Lowercase a scope and check the `app.model` shape
pub fn normalize_scope(scope: &str) -> Result<String, CoreError> {
    let scope = scope.trim().to_lowercase();
    match scope.split_once('.') {
        Some((app, model)) if !app.is_empty() && !model.is_empty() && !model.contains('.') => {
            Ok(scope)
        }
        _ => Err(CoreError::InvalidScope(scope)),
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.verb, self.stage_display(), self.scope)
    }
}

impl FromStr for ActionCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &'static str| CoreError::InvalidActionCode {
            code: s.to_string(),
            reason,
        };

        let (verb_stage, scope) = s.split_once('@').ok_or_else(|| invalid("missing '@scope'"))?;
        let (verb, stage) = verb_stage
            .split_once(':')
            .ok_or_else(|| invalid("missing ':STAGE'"))?;

        let verb: Verb = verb
            .trim()
            .parse()
            .map_err(|_| CoreError::UnknownVerb(verb.trim().to_string()))?;

        let scope = normalize_scope(scope).map_err(|_| invalid("scope must be 'app.model'"))?;

        Ok(ActionCode {
            verb,
            stage: normalize_stage(stage),
            scope,
        })
    }
}
