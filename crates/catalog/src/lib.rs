//! # HankoSign Catalog
//!
//! Immutable registry of allowed actions and role grants.
//!
//! ## Key Types
//! - [`Action`]: `(verb, stage, scope)` plus `repeatable` / `require_distinct_signer`
//! - [`Policy`]: a role and the set of actions it may perform
//! - [`Catalog`]: define/grant operations and lookups used by the engine
//! - [`CatalogManifest`]: JSON form used to bootstrap and persist a catalog
//!
//! Actions and policies are append-mostly: only labels, comments and notes
//! change after creation, and nothing is ever deleted.

mod action;
mod catalog;
mod error;
mod manifest;
mod policy;

pub use action::{Action, ActionFlags};
pub use catalog::{Catalog, SyncReport};
pub use error::{CatalogError, CatalogResult};
pub use manifest::{ActionDef, CatalogManifest, PolicyDef};
pub use policy::Policy;
