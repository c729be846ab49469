//! Read-side request types: id ranges, filters and snapshot segments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{AuditEntry, EntryId};

/// An optional, inclusive range of entry ids.  `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub from: Option<EntryId>,
    pub to: Option<EntryId>,
}

impl IdRange {
    /// The whole ledger.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(from: Option<EntryId>, to: Option<EntryId>) -> Self {
        Self { from, to }
    }

    /// Return true if `id` falls inside both bounds.
    pub fn contains(&self, id: EntryId) -> bool {
        self.from.map_or(true, |from| id >= from) && self.to.map_or(true, |to| id <= to)
    }
}

/// Filter for `list_entries`.  Every field that is set must match.
///
/// `actor` and `action` are exact matches; `since` is an inclusive lower
/// bound on `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.actor.as_deref().map_or(true, |a| entry.actor == a)
            && self.action.as_deref().map_or(true, |a| entry.action == a)
            && self.since.map_or(true, |since| entry.created_at >= since)
    }
}

/// A consistent snapshot of part of the chain.
///
/// `anchor` is the entry immediately preceding the first entry of
/// `entries` (the highest id below the range start), if one exists.  Its
/// recomputed hash is what the first entry's `previous_hash` must equal.
///
/// `unreadable` holds rows (in the range, or the anchor row) whose stored
/// fields could not be decoded back into an `AuditEntry`, such as a
/// `created_at` overwritten with text that is not a timestamp.  They are
/// integrity failures, not read failures, and verification reports each
/// one as a `hash_mismatch` at its id.
#[derive(Debug, Clone, Default)]
pub struct ChainSegment {
    pub anchor: Option<AuditEntry>,
    pub entries: Vec<AuditEntry>,
    /// Ascending by id.
    pub unreadable: Vec<UnreadableRow>,
}

/// A stored row that no longer decodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRow {
    pub id: EntryId,
    /// The `content_hash` column as stored.
    pub content_hash: String,
    pub reason: String,
}
