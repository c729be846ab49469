//! Verification report types.
//!
//! A broken chain is an expected, actionable outcome, so `verify_chain`
//! returns it as data: the id where trust was lost and the kind of break.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::EntryId;

/// Which check failed for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The stored `content_hash` does not match the recomputed hash.
    HashMismatch,
    /// The stored `previous_hash` does not match the predecessor's hash.
    ChainBreak,
    /// The stored `signature` does not match the recomputed HMAC.
    SignatureMismatch,
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakKind::HashMismatch => "hash_mismatch",
            BreakKind::ChainBreak => "chain_break",
            BreakKind::SignatureMismatch => "signature_mismatch",
        };
        f.write_str(s)
    }
}

/// How far verification goes after the first violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    /// Stop at the first violation; later entries cannot be trusted anyway.
    #[default]
    FirstBreak,
    /// Check every entry and report all violations (diagnostics).
    FullScan,
}

/// One broken link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityViolation {
    /// The entry where the check failed.
    pub entry_id: EntryId,
    pub kind: BreakKind,
    /// The value verification computed (`None` = genesis sentinel).
    pub expected: Option<String>,
    /// The value found in storage.
    pub found: Option<String>,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at entry {} (expected {}, found {})",
            self.kind,
            self.entry_id,
            self.expected.as_deref().unwrap_or("<none>"),
            self.found.as_deref().unwrap_or("<none>"),
        )
    }
}

/// The outcome of a chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// True only when `violations` is empty.
    pub valid: bool,
    /// Number of entries inspected.
    pub entries_checked: u64,
    /// Highest id confirmed valid before the first violation (or overall,
    /// when the chain is valid).  `None` if nothing was confirmed.
    pub last_verified_id: Option<EntryId>,
    /// Violations in ascending id order.  At most one in `FirstBreak` mode.
    pub violations: Vec<IntegrityViolation>,
}

impl VerificationReport {
    /// The report for an empty range.
    pub fn empty() -> Self {
        Self {
            valid: true,
            entries_checked: 0,
            last_verified_id: None,
            violations: Vec::new(),
        }
    }

    /// The first violation encountered, if any.
    pub fn first_violation(&self) -> Option<&IntegrityViolation> {
        self.violations.first()
    }
}
