//! Offline export format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{AuditEntry, LedgerId};

/// Format tag written into every export.
pub const EXPORT_FORMAT: &str = "attest-ledger-export-v1";

/// A self-contained copy of (part of) a ledger, for backup or for an
/// auditor who verifies the chain offline with the shared key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    pub format: String,
    pub ledger_id: LedgerId,
    pub exported_at: DateTime<Utc>,
    /// `content_hash` of the last exported entry; empty when no entries.
    pub terminal_hash: String,
    /// `content_hash` of the entry preceding the first exported one, when
    /// the export starts mid-chain.
    pub anchor_hash: Option<String>,
    pub entries: Vec<AuditEntry>,
}
