//! Configuration schema.
//!
//! An `AttestConfig` is deserialized from TOML.  Every section is optional;
//! an empty document yields an in-memory ledger keyed from
//! `AUDIT_HMAC_KEY`.
//!
//! Example:
//! ```toml
//! [storage]
//! backend = "sqlite"
//! path = "data/audit.db"
//!
//! [key]
//! env = "AUDIT_HMAC_KEY"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use attest_core::key::DEFAULT_KEY_ENV;

/// Which `LedgerStore` implementation backs the ledger.
///
/// Expressed in TOML as a lowercase string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; nothing is persisted.
    #[default]
    Memory,
    /// SQLite database file at `StorageConfig::path`.
    Sqlite,
}

/// The `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file.  Mandatory when `backend = "sqlite"`.
    pub path: Option<PathBuf>,
}

/// The `[key]` section.  The secret itself never lives in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    /// Name of the environment variable holding the HMAC secret.
    #[serde(default = "default_key_env")]
    pub env: String,
}

fn default_key_env() -> String {
    DEFAULT_KEY_ENV.to_string()
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            env: default_key_env(),
        }
    }
}

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttestConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub key: KeyConfig,
}
