//! Error types for the ATTEST audit ledger.
//!
//! Every fallible ledger operation returns `LedgerResult<T>`.  Integrity
//! problems found by verification are NOT errors: they are reported as data
//! inside a `VerificationReport`.

use thiserror::Error;

/// The unified error type for the ATTEST crates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The secret key or configuration file is missing or invalid.
    ///
    /// Raised at startup only.  A ledger that hits this never accepts appends.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The backing store is unavailable, timed out, or the write did not commit.
    ///
    /// Nothing is left visible when this is returned from `append`; the caller
    /// may retry.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// The caller supplied an empty or over-long `actor` / `action`.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A payload could not be turned into canonical JSON, or a stored row
    /// could not be decoded back into an entry.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl LedgerError {
    /// Shorthand for `LedgerError::Storage` with a formatted reason.
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// Shorthand for `LedgerError::Configuration` with a formatted reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the ATTEST crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
