//! Loading configuration and assembling a `Ledger` from it.
//!
//! Startup algorithm:
//!
//! 1. Parse the TOML document (or take the defaults).
//! 2. Resolve the HMAC secret from the configured environment variable.
//!    A missing, empty or placeholder secret is a `Configuration` error and
//!    no ledger is built.
//! 3. Open the configured store.
//! 4. Return `Ledger::new(store, key)`.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use attest_contracts::error::{LedgerError, LedgerResult};
use attest_core::{Ledger, LedgerStore, SecretKey};
use attest_store::{InMemoryLedgerStore, SqliteLedgerStore};

use crate::settings::{AttestConfig, StorageBackend};

impl AttestConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `LedgerError::Configuration` if the TOML is malformed or does
    /// not match the expected schema.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: AttestConfig = toml::from_str(s).map_err(|e| LedgerError::Configuration {
            reason: format!("failed to parse config TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Configuration {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&contents)
    }

    /// Check cross-field requirements that serde cannot express.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_none() {
            return Err(LedgerError::configuration(
                "storage.path is required when storage.backend = \"sqlite\"",
            ));
        }
        if self.key.env.trim().is_empty() {
            return Err(LedgerError::configuration("key.env must name a variable"));
        }
        Ok(())
    }

    /// Resolve the HMAC secret from the environment.
    pub fn secret_key(&self) -> LedgerResult<SecretKey> {
        SecretKey::from_env(&self.key.env)
    }

    /// Open the configured store.
    pub fn open_store(&self) -> LedgerResult<Arc<dyn LedgerStore>> {
        self.validate()?;
        let store: Arc<dyn LedgerStore> = match (self.storage.backend, &self.storage.path) {
            (StorageBackend::Memory, _) => Arc::new(InMemoryLedgerStore::new()),
            (StorageBackend::Sqlite, Some(path)) => Arc::new(SqliteLedgerStore::open(path)?),
            (StorageBackend::Sqlite, None) => {
                return Err(LedgerError::configuration("storage.path is not set"));
            }
        };
        Ok(store)
    }

    /// Resolve the key from the environment and build the ledger.
    ///
    /// The key is resolved before the store is opened, so a misconfigured
    /// process never touches the database.
    pub fn build_ledger(&self) -> LedgerResult<Ledger> {
        let key = self.secret_key()?;
        self.build_ledger_with_key(key)
    }

    /// Build the ledger with an explicitly supplied key.
    pub fn build_ledger_with_key(&self, key: SecretKey) -> LedgerResult<Ledger> {
        let store = self.open_store()?;
        info!(
            backend = ?self.storage.backend,
            ledger_id = %store.ledger_id(),
            "audit ledger ready"
        );
        Ok(Ledger::new(store, key))
    }
}
