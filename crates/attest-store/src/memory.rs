//! In-memory implementation of `LedgerStore`.
//!
//! `InMemoryLedgerStore` keeps all entries in a `Vec` behind an `RwLock`.
//! Appends hold the write lock across read-tail / seal / push, so the chain
//! can never fork.  Readers take the read lock only long enough to clone
//! what they need, and never observe a half-appended entry.
//!
//! Suitable when a single process writes the ledger: tests, demos and
//! short-lived tools.  Nothing survives the process.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use attest_contracts::{
    entry::{AuditEntry, EntryId, LedgerId},
    error::{LedgerError, LedgerResult},
    query::{ChainSegment, EntryFilter, IdRange},
};
use attest_core::traits::{LedgerStore, SealFn};

// ── Internal mutable state ────────────────────────────────────────────────────

/// The mutable interior of an `InMemoryLedgerStore`.
pub(crate) struct InMemoryState {
    /// All entries, ascending by id.
    pub(crate) entries: Vec<AuditEntry>,

    /// The next id to assign (starts at 1).
    pub(crate) next_id: u64,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory, append-only entry store.
///
/// # Thread safety
///
/// All methods take `&self`; share the store with `Arc`.
pub struct InMemoryLedgerStore {
    ledger_id: LedgerId,
    pub(crate) state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        let state = InMemoryState {
            entries: Vec::new(),
            next_id: 1,
        };
        Self {
            ledger_id: LedgerId::new(),
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, InMemoryState>> {
        self.state.read().map_err(|e| LedgerError::Storage {
            reason: format!("ledger state lock poisoned: {e}"),
        })
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, InMemoryState>> {
        self.state.write().map_err(|e| LedgerError::Storage {
            reason: format!("ledger state lock poisoned: {e}"),
        })
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the first entry with `id >= from`.
fn lower_bound(entries: &[AuditEntry], from: EntryId) -> usize {
    entries.partition_point(|e| e.id < from)
}

// ── LedgerStore impl ──────────────────────────────────────────────────────────

impl LedgerStore for InMemoryLedgerStore {
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    /// Seal against the current tail and push, all under the write lock.
    ///
    /// If `seal` fails, neither `entries` nor `next_id` change.
    fn append(&self, seal: &SealFn<'_>) -> LedgerResult<AuditEntry> {
        let mut state = self.write()?;

        let tail = state.entries.last().map(|e| e.content_hash.clone());
        let id = EntryId(state.next_id);

        let entry = seal(tail.as_deref())?.into_entry(id);

        state.entries.push(entry.clone());
        state.next_id += 1;

        debug!(entry_id = %id, "entry stored in memory");
        Ok(entry)
    }

    fn get(&self, id: EntryId) -> LedgerResult<Option<AuditEntry>> {
        let state = self.read()?;
        Ok(state
            .entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|idx| state.entries[idx].clone()))
    }

    fn snapshot(&self, range: IdRange) -> LedgerResult<ChainSegment> {
        let state = self.read()?;
        let entries = &state.entries;

        let start = range.from.map_or(0, |from| lower_bound(entries, from));
        let anchor = start.checked_sub(1).map(|idx| entries[idx].clone());
        let in_range = entries[start..]
            .iter()
            .take_while(|e| range.to.map_or(true, |to| e.id <= to))
            .cloned()
            .collect();

        Ok(ChainSegment {
            anchor,
            entries: in_range,
            unreadable: Vec::new(),
        })
    }

    fn query(&self, filter: &EntryFilter) -> LedgerResult<Vec<AuditEntry>> {
        let state = self.read()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn tail(&self) -> LedgerResult<Option<AuditEntry>> {
        Ok(self.read()?.entries.last().cloned())
    }

    fn count(&self) -> LedgerResult<u64> {
        Ok(self.read()?.entries.len() as u64)
    }
}
