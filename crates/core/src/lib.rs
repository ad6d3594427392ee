//! HankoSign Core - Domain types
//!
//! This crate contains the fundamental types shared by every HankoSign crate:
//! - `Verb`: The closed set of workflow verbs (SUBMIT, APPROVE, ...)
//! - `ActionCode`: External action identifier (`VERB:STAGE@scope`)
//! - `TargetRef`: Opaque reference to a domain object (`type#id`)
//! - `TargetRegistry`: Optional per-type existence lookups
//! - `SecretKey`: Redacted secret material

pub mod action_code;
pub mod error;
pub mod secret;
pub mod target;
pub mod verb;

pub use action_code::{normalize_scope, normalize_stage, ActionCode};
pub use error::CoreError;
pub use secret::SecretKey;
pub use target::{TargetRef, TargetRegistry};
pub use verb::Verb;
