//! HankoSign Engine - Authorization, recording and state projection
//!
//! Control flow: caller -> authorization (read-only) -> recording (atomic
//! ledger append) -> ledger; any consumer -> state projector (read-only).
//!
//! # Key Types
//! - `HankoSign`: The engine; `can_act`, `record`, `sign_once`, projections
//! - `Decision` / `DenialReason`: Authorization outcome as a value
//! - `StateSnapshot` / `ObjectStatus`: Workflow state replayed from the ledger
//! - `KeyValueStore`: Idempotency gate behind `sign_once`
//! - `EngineConfig`: Service secret and global windows

pub mod authz;
pub mod config;
pub mod engine;
pub mod error;
pub mod idempotency;
pub mod projector;
pub mod request;
pub mod seal;
mod stats;

pub use authz::{ActionRef, Decision, DenialReason};
pub use config::{
    EngineConfig, DEDUPE_WINDOW_SECS, IDEMPOTENCY_WINDOW_SECS, SERVICE_SECRET_ENV,
};
pub use engine::HankoSign;
pub use error::{EngineError, EngineResult};
pub use idempotency::{idempotency_key, KeyValueStore, MemoryStore, SqliteStore};
pub use projector::{object_status, project, ObjectStatus, StateSnapshot, StatusCode};
pub use request::{RequestMeta, SignRequest};
pub use seal::{AuditMismatch, AuditReport, SealLine};
pub use stats::EngineStats;
