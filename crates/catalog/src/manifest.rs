//! JSON catalog manifest
//!
//! ```json
//! {
//!   "actions": [
//!     { "verb": "APPROVE", "stage": "WIREF", "scope": "finance.paymentplan",
//!       "human_label": "Approve (WiRef)", "require_distinct_signer": true }
//!   ],
//!   "policies": [
//!     { "role": "wiref", "actions": ["APPROVE:WIREF@finance.paymentplan"] }
//!   ]
//! }
//! ```

use crate::error::CatalogResult;
use hankosign_core::Verb;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declarative action definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    pub verb: Verb,

    #[serde(default)]
    pub stage: String,

    pub scope: String,

    pub human_label: String,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub repeatable: bool,

    #[serde(default)]
    pub require_distinct_signer: bool,
}

/// Declarative role grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDef {
    pub role: String,

    /// Action codes (`VERB:STAGE@scope`)
    pub actions: Vec<String>,

    #[serde(default)]
    pub notes: String,
}

/// Whole-catalog manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub actions: Vec<ActionDef>,

    #[serde(default)]
    pub policies: Vec<PolicyDef>,
}

impl CatalogManifest {
    /// Load a manifest from a JSON file
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the manifest as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> CatalogResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "actions": [
                { "verb": "SUBMIT", "scope": "finance.paymentplan", "human_label": "Submit" }
            ]
        }"#;
        let manifest: CatalogManifest = serde_json::from_str(json).unwrap();

        assert_eq!(manifest.actions.len(), 1);
        assert_eq!(manifest.actions[0].stage, "");
        assert!(!manifest.actions[0].repeatable);
        assert!(manifest.policies.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.json");

        let manifest = CatalogManifest {
            actions: vec![ActionDef {
                verb: Verb::Release,
                stage: String::new(),
                scope: "academia_audit.auditsemester".to_string(),
                human_label: "Release/Print".to_string(),
                comment: String::new(),
                repeatable: true,
                require_distinct_signer: false,
            }],
            policies: vec![PolicyDef {
                role: "clerk".to_string(),
                actions: vec!["RELEASE:-@academia_audit.auditsemester".to_string()],
                notes: String::new(),
            }],
        };

        manifest.save(&path).unwrap();
        let loaded = CatalogManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }
}
