//! HankoSign CLI - Operator surface over a local data directory
//!
//! This crate provides the `hankosign` binary and command orchestration.

pub mod commands;
pub mod context;

pub use context::AppContext;
