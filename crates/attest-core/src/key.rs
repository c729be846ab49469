//! The ledger's MAC secret.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use attest_contracts::error::{LedgerError, LedgerResult};

/// Environment variable the secret is read from unless configured otherwise.
pub const DEFAULT_KEY_ENV: &str = "AUDIT_HMAC_KEY";

/// Placeholder shipped as a fallback default by early deployments.  A
/// ledger signed with it is forgeable by anyone, so it is refused outright.
const PLACEHOLDER_KEY: &str = "change_me";

/// Keys shorter than this are accepted but logged.
const RECOMMENDED_KEY_LEN: usize = 32;

/// Secret key for HMAC-SHA256 signatures.
///
/// Holds the keyed HMAC state rather than the raw bytes, so every signature
/// starts from a clone of it.  `Debug` never prints the key material.
#[derive(Clone)]
pub struct SecretKey {
    mac: HmacSha256,
}

pub(crate) type HmacSha256 = Hmac<Sha256>;

impl SecretKey {
    /// Build a key from raw bytes.
    ///
    /// Returns `LedgerError::Configuration` for an empty or whitespace-only
    /// key and for the `change_me` placeholder.
    pub fn new(bytes: impl Into<Vec<u8>>) -> LedgerResult<Self> {
        let bytes = bytes.into();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(LedgerError::configuration("audit secret key is empty"));
        }
        if bytes == PLACEHOLDER_KEY.as_bytes() {
            return Err(LedgerError::configuration(
                "audit secret key is the 'change_me' placeholder",
            ));
        }
        if bytes.len() < RECOMMENDED_KEY_LEN {
            warn!(
                key_len = bytes.len(),
                recommended = RECOMMENDED_KEY_LEN,
                "audit secret key is shorter than recommended"
            );
        }
        let mac = HmacSha256::new_from_slice(&bytes).map_err(|e| LedgerError::Configuration {
            reason: format!("audit secret key rejected by HMAC-SHA256: {e}"),
        })?;
        Ok(Self { mac })
    }

    /// Read the key from the environment variable `var`.
    pub fn from_env(var: &str) -> LedgerResult<Self> {
        let value = std::env::var(var).map_err(|e| LedgerError::Configuration {
            reason: format!("audit secret key variable '{var}' is not usable: {e}"),
        })?;
        Self::new(value).map_err(|e| match e {
            LedgerError::Configuration { reason } => LedgerError::Configuration {
                reason: format!("{reason} (from '{var}')"),
            },
            other => other,
        })
    }

    /// A fresh HMAC-SHA256 instance keyed with this secret.
    pub(crate) fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"<redacted>").finish()
    }
}
