//! # attest-contracts
//!
//! Shared types and error contracts for the ATTEST audit ledger.
//!
//! All crates in the workspace import from here. No ledger logic lives in
//! this crate, only data definitions and error types.

pub mod entry;
pub mod error;
pub mod export;
pub mod query;
pub mod report;

pub use entry::{AuditEntry, EntryId, LedgerId, SealedEntry};
pub use error::{LedgerError, LedgerResult};
pub use export::LedgerExport;
pub use query::{ChainSegment, EntryFilter, IdRange, UnreadableRow};
pub use report::{BreakKind, IntegrityViolation, VerificationReport, VerifyMode};
