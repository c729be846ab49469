//! Audit entry types.
//!
//! `AuditEntry` is the stored, immutable unit of the ledger.  `SealedEntry`
//! is the same record before the store has assigned it an id.

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of an `actor` identifier, in characters.
pub const MAX_ACTOR_LEN: usize = 128;

/// Maximum length of an `action` label, in characters.
pub const MAX_ACTION_LEN: usize = 256;

/// Sequence number of an entry.  Assigned by the store, starts at 1,
/// strictly increasing, gaps allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identifier of one persistent ledger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerId(pub Uuid);

impl LedgerId {
    /// Generate a fresh, random ledger id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single, immutable record in the hash chain.
///
/// `content_hash` commits to `previous_hash`, `created_at`, `actor`,
/// `action` and `payload`.  `signature` is an HMAC over `content_hash`.
/// Changing any committed field is detected by chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store-assigned sequence number.
    pub id: EntryId,

    /// Creation time (UTC, microsecond precision).
    pub created_at: DateTime<Utc>,

    /// Who performed the action (user id, service id).
    pub actor: String,

    /// What was done, e.g. `"upload"` or `"delete"`.
    pub action: String,

    /// Canonical JSON of the action-specific data.
    pub payload: String,

    /// SHA-256 (lowercase hex) over the committed fields.
    pub content_hash: String,

    /// `content_hash` of the preceding entry; `None` for the first entry.
    pub previous_hash: Option<String>,

    /// HMAC-SHA256 (lowercase hex) over `content_hash`.
    pub signature: String,
}

impl AuditEntry {
    /// Parse `payload` back into a JSON value.
    pub fn payload_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.payload)
    }

    /// The canonical rendering of `created_at` that is fed into the hash.
    pub fn created_at_canonical(&self) -> String {
        canonical_timestamp(&self.created_at)
    }
}

/// An entry whose hash and signature are computed but whose id is not yet
/// assigned.  Produced inside the store's append critical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEntry {
    pub created_at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub payload: String,
    pub content_hash: String,
    pub previous_hash: Option<String>,
    pub signature: String,
}

impl SealedEntry {
    /// Attach the store-assigned id.
    pub fn into_entry(self, id: EntryId) -> AuditEntry {
        AuditEntry {
            id,
            created_at: self.created_at,
            actor: self.actor,
            action: self.action,
            payload: self.payload,
            content_hash: self.content_hash,
            previous_hash: self.previous_hash,
            signature: self.signature,
        }
    }
}

/// Current UTC time truncated to microseconds, the precision the ledger
/// stores and hashes.
pub fn ledger_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// RFC 3339 with exactly six fractional digits and a `Z` suffix.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp previously produced by `canonical_timestamp`.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}
