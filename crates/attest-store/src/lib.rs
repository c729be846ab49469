//! # attest-store
//!
//! Append-only `LedgerStore` implementations for the ATTEST audit ledger.
//!
//! - [`InMemoryLedgerStore`]: a lock-guarded `Vec`; single process only.
//! - [`SqliteLedgerStore`]: durable SQLite file; safe with several writing
//!   processes thanks to `BEGIN IMMEDIATE` appends.
//!
//! Both assign ids starting at 1 and hand the current tail hash to the
//! ledger's seal closure inside their critical section.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
