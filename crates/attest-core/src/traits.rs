//! The storage seam for the ATTEST ledger.
//!
//! `Ledger` owns hashing and signing; a `LedgerStore` owns ordering,
//! atomicity and durability.  The split keeps the chain logic identical
//! across the in-memory and SQLite backends.

use attest_contracts::{
    entry::{AuditEntry, EntryId, LedgerId, SealedEntry},
    error::LedgerResult,
    query::{ChainSegment, EntryFilter, IdRange},
};

/// Builds a sealed entry from the current tail hash (`None` when empty).
pub type SealFn<'a> = dyn Fn(Option<&str>) -> LedgerResult<SealedEntry> + 'a;

/// Append-only storage for audit entries.
///
/// Implementations are shared between threads and must uphold:
///
/// - `append` reads the tail, calls `seal`, and persists the result as one
///   atomic step.  No two appends may observe the same tail.
/// - Ids are assigned by the store, strictly greater than every existing id.
/// - Readers never see a partially written entry.
/// - Entries are never modified or deleted.
pub trait LedgerStore: Send + Sync {
    /// Identifier of the ledger instance behind this store.
    fn ledger_id(&self) -> LedgerId;

    /// Atomically seal and persist the next entry.
    ///
    /// If `seal` fails, nothing is written and its error is returned.
    /// Persistence failures surface as `LedgerError::Storage`.
    fn append(&self, seal: &SealFn<'_>) -> LedgerResult<AuditEntry>;

    /// Fetch one entry by id.
    fn get(&self, id: EntryId) -> LedgerResult<Option<AuditEntry>>;

    /// Read a consistent, committed snapshot of `range` plus its anchor.
    fn snapshot(&self, range: IdRange) -> LedgerResult<ChainSegment>;

    /// Entries matching `filter`, ascending by id.
    fn query(&self, filter: &EntryFilter) -> LedgerResult<Vec<AuditEntry>>;

    /// The entry with the highest id, if any.
    fn tail(&self) -> LedgerResult<Option<AuditEntry>>;

    /// Number of stored entries.
    fn count(&self) -> LedgerResult<u64>;
}
