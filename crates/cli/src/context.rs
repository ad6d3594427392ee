//! Application context - wires everything together
//!
//! Data directory layout:
//! - `engine.json`: engine configuration (service secret, windows)
//! - `catalog.json`: catalog manifest
//! - `registry.db`: signatories and signer secrets
//! - `ledger.db`: signatures
//! - `idempotency.db`: `sign-once` keys, shared across invocations

use hankosign_catalog::{Catalog, CatalogManifest};
use hankosign_core::SecretKey;
use hankosign_engine::{EngineConfig, HankoSign, SqliteStore, SERVICE_SECRET_ENV};
use hankosign_ledger::Ledger;
use hankosign_signatory::SignatoryRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context - wires together all components
pub struct AppContext {
    pub catalog: Catalog,
    pub registry: Arc<SignatoryRegistry>,
    pub ledger: Arc<Ledger>,
    pub config: EngineConfig,
    idempotency: Arc<SqliteStore>,
    /// Secret as stored in `engine.json`, before any environment override
    stored_secret: SecretKey,
    secret_from_env: bool,
    data_path: PathBuf,
}

impl AppContext {
    /// Open the data directory, creating stores as needed
    ///
    /// The service secret may be overridden by `HANKOSIGN_SERVICE_SECRET`.
    pub fn new(data_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        Self::open(data_path, std::env::var(SERVICE_SECRET_ENV).ok())
    }

    /// Open the data directory with an explicit secret override
    ///
    /// An overriding secret is used for signing but never written back to
    /// `engine.json`.
    pub fn open(
        data_path: impl AsRef<Path>,
        env_secret: Option<String>,
    ) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_path)?;

        let config_path = data_path.join("engine.json");
        let mut config = if config_path.exists() {
            EngineConfig::from_file(&config_path)?
        } else {
            EngineConfig::default()
        };
        let stored_secret = config.service_secret.clone();
        let secret_from_env = env_secret.is_some_and(|secret| config.override_secret(&secret));
        if secret_from_env {
            tracing::debug!("Service secret taken from the environment");
        }

        let catalog_path = data_path.join("catalog.json");
        let catalog = if catalog_path.exists() {
            Catalog::from_manifest(&CatalogManifest::load(&catalog_path)?)?
        } else {
            Catalog::new()
        };

        let registry = Arc::new(SignatoryRegistry::new(data_path.join("registry.db"))?);
        let ledger = Arc::new(Ledger::new(data_path.join("ledger.db"))?);
        let idempotency = Arc::new(SqliteStore::new(data_path.join("idempotency.db"))?);

        tracing::debug!(
            data = %data_path.display(),
            actions = catalog.actions().count(),
            policies = catalog.policies().len(),
            "Opened data directory"
        );

        Ok(Self {
            catalog,
            registry,
            ledger,
            config,
            idempotency,
            stored_secret,
            secret_from_env,
            data_path,
        })
    }

    /// Whether `init` has written an engine configuration
    pub fn is_initialized(&self) -> bool {
        self.config_path().exists()
    }

    /// Engine over the current catalog snapshot
    ///
    /// Every engine shares the idempotency store in the data directory, so
    /// `sign-once` repeats collapse across separate invocations.
    pub fn engine(&self) -> HankoSign {
        HankoSign::new(
            self.catalog.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.ledger),
            self.config.clone(),
        )
        .with_idempotency_store(self.idempotency.clone())
    }

    /// Persist the catalog manifest
    pub fn save_catalog(&self) -> Result<(), anyhow::Error> {
        self.catalog.to_manifest().save(self.catalog_path())?;
        Ok(())
    }

    /// Persist the engine configuration
    ///
    /// A secret that came from the environment is not written; the stored
    /// one (possibly empty) is kept instead.
    pub fn save_config(&self) -> Result<(), anyhow::Error> {
        let mut persisted = self.config.clone();
        if self.secret_from_env {
            persisted.service_secret = self.stored_secret.clone();
        }
        std::fs::write(self.config_path(), serde_json::to_string_pretty(&persisted)?)?;
        Ok(())
    }

    /// Whether the active service secret came from the environment
    pub fn secret_from_env(&self) -> bool {
        self.secret_from_env
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_path.join("engine.json")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_path.join("catalog.json")
    }
}
