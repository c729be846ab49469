//! The ATTEST audit ledger.
//!
//! `Ledger` is the only component that creates entries.  Every append runs
//! the same pipeline inside the store's critical section:
//!
//!   validate → canonical payload → [read tail → timestamp → hash → sign] → persist
//!
//! The bracketed part executes in the `seal` closure handed to
//! `LedgerStore::append`, so the tail it links to cannot change underneath
//! it.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use attest_contracts::{
    entry::{ledger_now, AuditEntry, EntryId, LedgerId, SealedEntry, MAX_ACTION_LEN, MAX_ACTOR_LEN},
    error::{LedgerError, LedgerResult},
    export::{LedgerExport, EXPORT_FORMAT},
    query::{EntryFilter, IdRange},
    report::{VerificationReport, VerifyMode},
};

use crate::{
    chain::{canonical_payload, hash_entry, sign_hash, verify_segment},
    key::SecretKey,
    traits::LedgerStore,
};

/// An append-only, hash-chained, HMAC-signed audit ledger.
///
/// Cloning is cheap: clones share the same store and key.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    key: SecretKey,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("ledger_id", &self.store.ledger_id())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger over `store`, signing with `key`.
    ///
    /// Key validation happens when the `SecretKey` is built, so a `Ledger`
    /// that exists can always sign.
    pub fn new(store: Arc<dyn LedgerStore>, key: SecretKey) -> Self {
        Self { store, key }
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.store.ledger_id()
    }

    /// Append one action and return the id the store assigned to it.
    pub fn append<P: Serialize + ?Sized>(
        &self,
        actor: &str,
        action: &str,
        payload: &P,
    ) -> LedgerResult<EntryId> {
        self.append_entry(actor, action, payload).map(|entry| entry.id)
    }

    /// Append one action and return the full stored entry.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty or over-long `actor` / `action`
    /// - `Serialization` if `payload` cannot be expressed as JSON
    /// - `Storage` if the store did not commit; the tail is unchanged
    pub fn append_entry<P: Serialize + ?Sized>(
        &self,
        actor: &str,
        action: &str,
        payload: &P,
    ) -> LedgerResult<AuditEntry> {
        validate_label("actor", actor, MAX_ACTOR_LEN)?;
        validate_label("action", action, MAX_ACTION_LEN)?;
        let payload = canonical_payload(payload)?;

        let seal = |previous_hash: Option<&str>| -> LedgerResult<SealedEntry> {
            let created_at = ledger_now();
            let content_hash = hash_entry(previous_hash, &created_at, actor, action, &payload);
            let signature = sign_hash(&self.key, &content_hash);
            Ok(SealedEntry {
                created_at,
                actor: actor.to_string(),
                action: action.to_string(),
                payload: payload.clone(),
                content_hash,
                previous_hash: previous_hash.map(str::to_string),
                signature,
            })
        };

        let entry = self.store.append(&seal)?;

        info!(
            entry_id = %entry.id,
            actor = %entry.actor,
            action = %entry.action,
            content_hash = %entry.content_hash,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Verify the chain over `range` (use `IdRange::all()` for the whole
    /// ledger), stopping at the first broken link.
    pub fn verify_chain(&self, range: IdRange) -> LedgerResult<VerificationReport> {
        self.verify_chain_with(range, VerifyMode::FirstBreak)
    }

    /// Verify the chain over `range` in the given mode.
    ///
    /// Storage errors propagate; integrity problems are returned inside the
    /// report.
    pub fn verify_chain_with(
        &self,
        range: IdRange,
        mode: VerifyMode,
    ) -> LedgerResult<VerificationReport> {
        let segment = self.store.snapshot(range)?;
        debug!(
            from = ?range.from,
            to = ?range.to,
            anchored = segment.anchor.is_some(),
            entries = segment.entries.len(),
            unreadable = segment.unreadable.len(),
            "verifying audit chain"
        );

        let report = verify_segment(&segment, &self.key, mode);

        info!(
            valid = report.valid,
            entries_checked = report.entries_checked,
            violations = report.violations.len(),
            "audit chain verification finished"
        );
        Ok(report)
    }

    pub fn get_entry(&self, id: EntryId) -> LedgerResult<Option<AuditEntry>> {
        self.store.get(id)
    }

    /// Entries matching `filter`, ascending by id.
    pub fn list_entries(&self, filter: &EntryFilter) -> LedgerResult<Vec<AuditEntry>> {
        self.store.query(filter)
    }

    /// The current chain tail.
    pub fn tail(&self) -> LedgerResult<Option<AuditEntry>> {
        self.store.tail()
    }

    pub fn len(&self) -> LedgerResult<u64> {
        self.store.count()
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Export `range` with enough context (the anchor hash) to verify it
    /// offline with `chain::verify_export`.
    ///
    /// Fails with `Serialization` if a stored row in the range no longer
    /// decodes; run `verify_chain` to locate it.
    pub fn export(&self, range: IdRange) -> LedgerResult<LedgerExport> {
        let segment = self.store.snapshot(range)?;
        if let Some(row) = segment.unreadable.first() {
            return Err(LedgerError::Serialization {
                reason: format!("entry {} cannot be exported: {}", row.id, row.reason),
            });
        }
        let terminal_hash = segment
            .entries
            .last()
            .map(|e| e.content_hash.clone())
            .unwrap_or_default();

        Ok(LedgerExport {
            format: EXPORT_FORMAT.to_string(),
            ledger_id: self.ledger_id(),
            exported_at: Utc::now(),
            terminal_hash,
            anchor_hash: segment.anchor.map(|a| a.content_hash),
            entries: segment.entries,
        })
    }
}

fn validate_label(field: &str, value: &str, max_len: usize) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidInput {
            reason: format!("{field} must not be empty"),
        });
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(LedgerError::InvalidInput {
            reason: format!("{field} is {len} characters, limit is {max_len}"),
        });
    }
    Ok(())
}
