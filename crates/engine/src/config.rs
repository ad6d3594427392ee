//! Engine configuration
//!
//! Windows are global: every action shares the same dedupe and idempotency
//! spans. Values come from a JSON file, the environment, or the defaults.

use hankosign_core::SecretKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the service secret
pub const SERVICE_SECRET_ENV: &str = "HANKOSIGN_SERVICE_SECRET";

/// Default soft-dedupe window
pub const DEDUPE_WINDOW_SECS: u64 = 10;

/// Default idempotency window for `sign_once`
pub const IDEMPOTENCY_WINDOW_SECS: u64 = 10;

/// Configuration for the HankoSign engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Service-wide HMAC secret, combined with each signer secret
    #[serde(default)]
    pub service_secret: SecretKey,

    /// Same signatory, same (target, verb, stage) within this span returns
    /// the existing signature
    #[serde(default = "default_dedupe_window_secs")]
    pub dedupe_window_secs: u64,

    /// Lifetime of a `sign_once` idempotency key
    #[serde(default = "default_idempotency_window_secs")]
    pub idempotency_window_secs: u64,

    /// Digest characters printed on seals
    #[serde(default = "default_seal_prefix_len")]
    pub seal_prefix_len: usize,
}

fn default_dedupe_window_secs() -> u64 {
    DEDUPE_WINDOW_SECS
}

fn default_idempotency_window_secs() -> u64 {
    IDEMPOTENCY_WINDOW_SECS
}

fn default_seal_prefix_len() -> usize {
    12
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_secret: SecretKey::default(),
            dedupe_window_secs: default_dedupe_window_secs(),
            idempotency_window_secs: default_idempotency_window_secs(),
            seal_prefix_len: default_seal_prefix_len(),
        }
    }
}

impl EngineConfig {
    /// Defaults with the given service secret
    pub fn with_secret(service_secret: SecretKey) -> Self {
        Self {
            service_secret,
            ..Self::default()
        }
    }

    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Defaults, with the service secret taken from `HANKOSIGN_SERVICE_SECRET`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields that are set in the environment
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SERVICE_SECRET_ENV) {
            self.override_secret(&secret);
        }
    }

    /// Replace the service secret unless `secret` is blank. Returns whether
    /// it was replaced.
    pub fn override_secret(&mut self, secret: &str) -> bool {
        let secret = secret.trim();
        if secret.is_empty() {
            return false;
        }
        self.service_secret = SecretKey::new(secret);
        true
    }

    /// Get dedupe window as chrono Duration
    pub fn dedupe_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedupe_window_secs as i64)
    }

    /// Get idempotency window as Duration
    pub fn idempotency_window(&self) -> Duration {
        Duration::from_secs(self.idempotency_window_secs)
    }
}
