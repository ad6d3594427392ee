//! Opaque target references
//!
//! The engine never holds a foreign key into domain tables. A target is just
//! a `(type, id)` pair; hosts that want existence checks register a lookup
//! per type in a [`TargetRegistry`].

use crate::action_code::normalize_scope;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Reference to an arbitrary domain object
///
/// Format: `type#id` (e.g. `finance.paymentplan#42`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef {
    /// Type name, same namespace as action scopes (`app.model`)
    pub type_name: String,

    /// Opaque object identifier
    pub id: String,
}

impl TargetRef {
    pub fn new(type_name: impl AsRef<str>, id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidTarget(format!("{}#", type_name.as_ref())));
        }
        Ok(Self {
            type_name: normalize_scope(type_name.as_ref())?,
            id: id.trim().to_string(),
        })
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

impl FromStr for TargetRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, id) = s
            .split_once('#')
            .ok_or_else(|| CoreError::InvalidTarget(s.to_string()))?;
        TargetRef::new(type_name, id).map_err(|_| CoreError::InvalidTarget(s.to_string()))
    }
}

type Lookup = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Maps type names to existence lookups
///
/// Types without a registered lookup are treated as opaque and always
/// resolve.
#[derive(Default)]
pub struct TargetRegistry {
    lookups: HashMap<String, Lookup>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lookup for a type name, replacing any previous one
    pub fn register<F>(&mut self, type_name: &str, lookup: F) -> Result<(), CoreError>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let type_name = normalize_scope(type_name)?;
        self.lookups.insert(type_name, Box::new(lookup));
        Ok(())
    }

    /// Whether a lookup is registered for this type
    pub fn knows(&self, type_name: &str) -> bool {
        self.lookups.contains_key(type_name)
    }

    /// `Some(found)` for registered types, `None` for opaque ones
    pub fn resolve(&self, target: &TargetRef) -> Option<bool> {
        self.lookups
            .get(&target.type_name)
            .map(|lookup| lookup(&target.id))
    }
}

impl fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.lookups.keys().collect();
        types.sort();
        f.debug_struct("TargetRegistry").field("types", &types).finish()
    }
}
