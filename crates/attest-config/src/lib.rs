//! # attest-config
//!
//! TOML and environment configuration for the ATTEST audit ledger.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use attest_config::AttestConfig;
//!
//! let ledger = AttestConfig::from_file(Path::new("attest.toml"))?.build_ledger()?;
//! ```
//!
//! The file chooses the storage backend and names the environment variable
//! holding the HMAC secret.  The secret itself is never read from the file.

pub mod loader;
pub mod settings;

pub use settings::{AttestConfig, KeyConfig, StorageBackend, StorageConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────
