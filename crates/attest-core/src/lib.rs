//! # attest-core
//!
//! The hash-chained, HMAC-signed audit ledger.
//!
//! This crate provides:
//! - `chain`: canonical payloads, content hashing, signing, verification
//! - `LedgerStore`: the storage seam implemented by `attest-store`
//! - `SecretKey`: the MAC secret, validated at construction
//! - `Ledger`: append / verify / read operations over a store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use attest_core::{Ledger, SecretKey};
//! use attest_contracts::IdRange;
//! use attest_store::InMemoryLedgerStore;
//!
//! let key = SecretKey::from_env("AUDIT_HMAC_KEY")?;
//! let ledger = Ledger::new(Arc::new(InMemoryLedgerStore::new()), key);
//! let id = ledger.append("alice", "upload", &serde_json::json!({ "file": "a.pdf" }))?;
//! assert!(ledger.verify_chain(IdRange::all())?.valid);
//! ```

pub mod chain;
pub mod key;
pub mod ledger;
pub mod traits;

pub use key::SecretKey;
pub use ledger::Ledger;
pub use traits::LedgerStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use serde::Serialize;
    use serde_json::json;

    use attest_contracts::{
        entry::{AuditEntry, EntryId, LedgerId},
        error::{LedgerError, LedgerResult},
        query::{ChainSegment, EntryFilter, IdRange, UnreadableRow},
        report::{BreakKind, VerifyMode},
    };

    use super::chain::{self, canonical_payload, hash_entry};
    use super::traits::SealFn;
    use super::{Ledger, LedgerStore, SecretKey};

    // ── Mock stores ───────────────────────────────────────────────────────────

    /// Minimal store: a `Vec` behind a `Mutex`, ids from 1.
    #[derive(Default)]
    struct VecStore {
        id: LedgerId,
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl VecStore {
        fn edit(&self, id: u64, f: impl FnOnce(&mut AuditEntry)) {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.iter_mut().find(|e| e.id == EntryId(id)).unwrap();
            f(entry);
        }

        fn remove(&self, id: u64) {
            self.entries.lock().unwrap().retain(|e| e.id != EntryId(id));
        }
    }

    impl LedgerStore for VecStore {
        fn ledger_id(&self) -> LedgerId {
            self.id
        }

        fn append(&self, seal: &SealFn<'_>) -> LedgerResult<AuditEntry> {
            let mut entries = self.entries.lock().unwrap();
            let tail = entries.last().map(|e| e.content_hash.clone());
            let next = entries.last().map_or(1, |e| e.id.0 + 1);
            let entry = seal(tail.as_deref())?.into_entry(EntryId(next));
            entries.push(entry.clone());
            Ok(entry)
        }

        fn get(&self, id: EntryId) -> LedgerResult<Option<AuditEntry>> {
            Ok(self.entries.lock().unwrap().iter().find(|e| e.id == id).cloned())
        }

        fn snapshot(&self, range: IdRange) -> LedgerResult<ChainSegment> {
            let entries = self.entries.lock().unwrap();
            let anchor = range
                .from
                .and_then(|from| entries.iter().rev().find(|e| e.id < from).cloned());
            let entries = entries.iter().filter(|e| range.contains(e.id)).cloned().collect();
            Ok(ChainSegment {
                anchor,
                entries,
                unreadable: Vec::new(),
            })
        }

        fn query(&self, filter: &EntryFilter) -> LedgerResult<Vec<AuditEntry>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().filter(|e| filter.matches(e)).cloned().collect())
        }

        fn tail(&self) -> LedgerResult<Option<AuditEntry>> {
            Ok(self.entries.lock().unwrap().last().cloned())
        }

        fn count(&self) -> LedgerResult<u64> {
            Ok(self.entries.lock().unwrap().len() as u64)
        }
    }

    /// A store whose backend is always down.
    struct DownStore;

    impl LedgerStore for DownStore {
        fn ledger_id(&self) -> LedgerId {
            LedgerId::new()
        }
        fn append(&self, _seal: &SealFn<'_>) -> LedgerResult<AuditEntry> {
            Err(LedgerError::storage("connection refused"))
        }
        fn get(&self, _id: EntryId) -> LedgerResult<Option<AuditEntry>> {
            Err(LedgerError::storage("connection refused"))
        }
        fn snapshot(&self, _range: IdRange) -> LedgerResult<ChainSegment> {
            Err(LedgerError::storage("connection refused"))
        }
        fn query(&self, _filter: &EntryFilter) -> LedgerResult<Vec<AuditEntry>> {
            Err(LedgerError::storage("connection refused"))
        }
        fn tail(&self) -> LedgerResult<Option<AuditEntry>> {
            Err(LedgerError::storage("connection refused"))
        }
        fn count(&self) -> LedgerResult<u64> {
            Err(LedgerError::storage("connection refused"))
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn key(material: &str) -> SecretKey {
        SecretKey::new(material.as_bytes().to_vec()).unwrap()
    }

    fn ledger() -> (Ledger, Arc<VecStore>) {
        let store = Arc::new(VecStore::default());
        let ledger = Ledger::new(store.clone(), key("test-secret-0123456789abcdef0123"));
        (ledger, store)
    }

    /// The two-entry document lifecycle: alice uploads, bob deletes.
    fn upload_then_delete(ledger: &Ledger) -> (EntryId, EntryId) {
        let first = ledger.append("alice", "upload", &json!({ "file": "a.pdf" })).unwrap();
        let second = ledger.append("bob", "delete", &json!({ "file": "a.pdf" })).unwrap();
        (first, second)
    }

    // ── Append & linkage ──────────────────────────────────────────────────────

    #[test]
    fn test_upload_delete_scenario() {
        let (ledger, _store) = ledger();
        let (first, second) = upload_then_delete(&ledger);

        assert_eq!(first, EntryId(1));
        assert_eq!(second, EntryId(2));

        let e1 = ledger.get_entry(first).unwrap().unwrap();
        let e2 = ledger.get_entry(second).unwrap().unwrap();
        assert_eq!(e2.previous_hash.as_deref(), Some(e1.content_hash.as_str()));

        let report = ledger.verify_chain(IdRange::all()).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 2);
        assert_eq!(report.last_verified_id, Some(EntryId(2)));
    }

    #[test]
    fn test_genesis_entry_has_no_previous_hash() {
        let (ledger, _store) = ledger();
        let entry = ledger.append_entry("svc-ocr", "ingest", &json!({ "pages": 3 })).unwrap();

        assert_eq!(entry.previous_hash, None);
        assert!(ledger.verify_chain(IdRange::all()).unwrap().valid);
    }

    #[test]
    fn test_empty_ledger_verifies() {
        let (ledger, _store) = ledger();
        let report = ledger.verify_chain(IdRange::all()).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 0);
        assert!(ledger.is_empty().unwrap());
        assert!(ledger.tail().unwrap().is_none());
    }

    #[test]
    fn test_stored_hash_is_reproducible() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);
        for entry in store.entries.lock().unwrap().iter() {
            assert_eq!(chain::recompute_hash(entry), entry.content_hash);
        }
        assert!(chain::is_linked(&store.entries.lock().unwrap()));
    }

    #[test]
    fn test_payload_stored_canonically() {
        let (ledger, _store) = ledger();
        let entry = ledger
            .append_entry("alice", "upload", &json!({ "z": 1, "a": { "y": 2, "b": 3 } }))
            .unwrap();
        assert_eq!(entry.payload, r#"{"a":{"b":3,"y":2},"z":1}"#);
        assert_eq!(entry.payload_value().unwrap()["a"]["y"], 2);
    }

    // ── Tamper detection ──────────────────────────────────────────────────────

    #[test]
    fn test_payload_overwrite_reports_hash_mismatch_at_first_entry() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);

        store.edit(1, |e| e.payload = r#"{"file":"b.pdf"}"#.to_string());

        let report = ledger.verify_chain(IdRange::all()).unwrap();
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1, "first-break mode reports one violation");
        let first = report.first_violation().unwrap();
        assert_eq!(first.entry_id, EntryId(1));
        assert_eq!(first.kind, BreakKind::HashMismatch);
        assert_eq!(report.last_verified_id, None);
    }

    #[test]
    fn test_full_scan_reports_cascade() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);
        ledger.append("carol", "access_grant", &json!({ "file": "a.pdf" })).unwrap();

        store.edit(1, |e| e.payload = r#"{"file":"b.pdf"}"#.to_string());

        let report = ledger.verify_chain_with(IdRange::all(), VerifyMode::FullScan).unwrap();
        let kinds: Vec<_> = report.violations.iter().map(|v| (v.entry_id.0, v.kind)).collect();
        assert_eq!(
            kinds,
            vec![(1, BreakKind::HashMismatch), (2, BreakKind::ChainBreak)],
            "entry 3 still links to entry 2's recomputed hash"
        );
        assert_eq!(report.entries_checked, 3);
    }

    #[test]
    fn test_previous_hash_overwrite_reports_chain_break() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);

        store.edit(2, |e| e.previous_hash = Some("ff".repeat(32)));

        let report = ledger.verify_chain(IdRange::all()).unwrap();
        let v = report.first_violation().unwrap();
        assert_eq!((v.entry_id, v.kind), (EntryId(2), BreakKind::ChainBreak));
        assert_eq!(report.last_verified_id, Some(EntryId(1)));
    }

    #[test]
    fn test_signature_overwrite_reports_signature_mismatch() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);

        store.edit(2, |e| e.signature = "00".repeat(32));

        let v = ledger.verify_chain(IdRange::all()).unwrap().violations[0].clone();
        assert_eq!((v.entry_id, v.kind), (EntryId(2), BreakKind::SignatureMismatch));
    }

    #[test]
    fn test_non_hex_signature_never_matches() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);
        store.edit(1, |e| e.signature = "not-hex".to_string());

        let v = ledger.verify_chain(IdRange::all()).unwrap().violations[0].clone();
        assert_eq!(v.kind, BreakKind::SignatureMismatch);
    }

    #[test]
    fn test_deleted_entry_breaks_chain_at_successor() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);
        ledger.append("carol", "access_grant", &json!({ "file": "a.pdf" })).unwrap();

        store.remove(2);

        let v = ledger.verify_chain(IdRange::all()).unwrap().violations[0].clone();
        assert_eq!((v.entry_id, v.kind), (EntryId(3), BreakKind::ChainBreak));
    }

    #[test]
    fn test_different_key_reports_signature_mismatch() {
        let (ledger, store) = ledger();
        upload_then_delete(&ledger);

        let other = Ledger::new(store, key("a-completely-different-secret-key"));
        let report = other.verify_chain(IdRange::all()).unwrap();
        let v = report.first_violation().unwrap();
        assert_eq!((v.entry_id, v.kind), (EntryId(1), BreakKind::SignatureMismatch));
    }

    // ── Ranges & export ───────────────────────────────────────────────────────

    #[test]
    fn test_mid_chain_range_uses_anchor() {
        let (ledger, _store) = ledger();
        for i in 0..5 {
            ledger.append("alice", "upload", &json!({ "n": i })).unwrap();
        }
        let range = IdRange::new(Some(EntryId(3)), Some(EntryId(4)));
        let report = ledger.verify_chain(range).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 2);
        assert_eq!(report.last_verified_id, Some(EntryId(4)));
    }

    #[test]
    fn test_range_after_tampered_anchor_reports_chain_break() {
        let (ledger, store) = ledger();
        for i in 0..3 {
            ledger.append("alice", "upload", &json!({ "n": i })).unwrap();
        }
        store.edit(2, |e| e.action = "download".to_string());

        let report = ledger.verify_chain(IdRange::new(Some(EntryId(3)), None)).unwrap();
        let v = report.first_violation().unwrap();
        assert_eq!((v.entry_id, v.kind), (EntryId(3), BreakKind::ChainBreak));
    }

    #[test]
    fn test_export_verifies_offline() {
        let (ledger, _store) = ledger();
        for i in 0..4 {
            ledger.append("alice", "upload", &json!({ "n": i })).unwrap();
        }
        let export = ledger.export(IdRange::new(Some(EntryId(2)), None)).unwrap();

        assert_eq!(export.entries.len(), 3);
        assert!(export.anchor_hash.is_some());
        assert_eq!(export.terminal_hash, export.entries.last().unwrap().content_hash);

        let json = serde_json::to_string(&export).unwrap();
        let decoded: attest_contracts::LedgerExport = serde_json::from_str(&json).unwrap();
        let report = chain::verify_export(
            &decoded,
            &key("test-secret-0123456789abcdef0123"),
            VerifyMode::FirstBreak,
        );
        assert!(report.valid);
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_list_entries_filters_and_orders() {
        let (ledger, _store) = ledger();
        upload_then_delete(&ledger);
        ledger.append("alice", "upload", &json!({ "file": "c.pdf" })).unwrap();

        let alice = ledger.list_entries(&EntryFilter::default().actor("alice")).unwrap();
        let ids: Vec<u64> = alice.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 3]);

        let deletes = ledger.list_entries(&EntryFilter::default().action("delete")).unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].actor, "bob");

        assert_eq!(ledger.len().unwrap(), 3);
        assert_eq!(ledger.tail().unwrap().unwrap().id, EntryId(3));
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    #[test]
    fn test_invalid_input_rejected() {
        let (ledger, store) = ledger();

        let err = ledger.append("", "upload", &json!({})).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));

        let err = ledger.append("alice", "   ", &json!({})).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));

        let long_actor = "a".repeat(129);
        let err = ledger.append(&long_actor, "upload", &json!({})).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));

        assert_eq!(store.count().unwrap(), 0, "rejected appends must not write");
    }

    #[test]
    fn test_unserializable_payload_rejected() {
        let (ledger, store) = ledger();
        let mut payload = BTreeMap::new();
        payload.insert((1u8, 2u8), "tuple keys are not JSON");

        let err = ledger.append("alice", "upload", &payload).unwrap_err();
        assert!(matches!(err, LedgerError::Serialization { .. }));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_storage_error_propagates() {
        let ledger = Ledger::new(Arc::new(DownStore), key("test-secret-0123456789abcdef0123"));

        let err = ledger.append("alice", "upload", &json!({})).unwrap_err();
        assert!(matches!(err, LedgerError::Storage { .. }));

        let err = ledger.verify_chain(IdRange::all()).unwrap_err();
        assert!(matches!(err, LedgerError::Storage { .. }));
    }

    #[test]
    fn test_secret_key_validation() {
        assert!(matches!(
            SecretKey::new(Vec::new()),
            Err(LedgerError::Configuration { .. })
        ));
        assert!(matches!(
            SecretKey::new(" \n\t".as_bytes().to_vec()),
            Err(LedgerError::Configuration { .. })
        ));
        assert!(matches!(
            SecretKey::new("change_me".as_bytes().to_vec()),
            Err(LedgerError::Configuration { .. })
        ));
        assert!(SecretKey::new("short".as_bytes().to_vec()).is_ok());
    }

    #[test]
    fn test_secret_key_from_unset_env_is_configuration_error() {
        let err = SecretKey::from_env("ATTEST_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        match err {
            LedgerError::Configuration { reason } => {
                assert!(reason.contains("ATTEST_TEST_KEY_THAT_IS_NEVER_SET"))
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_keyed_mac_is_reusable_across_signatures() {
        let a = key("test-secret-0123456789abcdef0123");
        let b = a.clone();
        let first = chain::sign_hash(&a, "00ff");
        assert_eq!(first, chain::sign_hash(&a, "00ff"));
        assert_eq!(first, chain::sign_hash(&b, "00ff"));
        assert_eq!(first, chain::sign_hash(&key("test-secret-0123456789abcdef0123"), "00ff"));
        assert!(chain::signature_matches(&b, "00ff", &first));
        assert_ne!(first, chain::sign_hash(&a, "00fe"));
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let rendered = format!("{:?}", key("super-secret-material"));
        assert!(!rendered.contains("super-secret-material"));
        assert!(rendered.contains("redacted"));
    }

    // ── Hash encoding ─────────────────────────────────────────────────────────

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = hash_entry(None, &ts, "a|b", "c", "{}");
        let b = hash_entry(None, &ts, "a", "b|c", "{}");
        let c = hash_entry(None, &ts, "ab", "c", "{}");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_absent_and_empty_previous_hash_differ() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_ne!(
            hash_entry(None, &ts, "alice", "upload", "{}"),
            hash_entry(Some(""), &ts, "alice", "upload", "{}"),
        );
    }

    #[test]
    fn test_hash_is_lowercase_hex_sha256() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let h = hash_entry(None, &ts, "alice", "upload", "{}");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_canonical_payload_bytes_for_nested_struct() {
        #[derive(Serialize)]
        struct Tag {
            z: u8,
            a: u8,
        }
        #[derive(Serialize)]
        struct File {
            tags: Vec<Tag>,
            size: u64,
            name: &'static str,
        }
        #[derive(Serialize)]
        struct Upload {
            zone: &'static str,
            file: File,
            actor_note: Option<&'static str>,
        }

        let payload = Upload {
            zone: "eu",
            file: File {
                tags: vec![Tag { z: 1, a: 2 }],
                size: 42,
                name: "a.pdf",
            },
            actor_note: None,
        };
        assert_eq!(
            canonical_payload(&payload).unwrap(),
            r#"{"actor_note":null,"file":{"name":"a.pdf","size":42,"tags":[{"a":2,"z":1}]},"zone":"eu"}"#
        );
    }

    #[test]
    fn test_unreadable_row_reported_in_id_order() {
        let (ledger, store) = ledger();
        for i in 0..3 {
            ledger.append("alice", "upload", &json!({ "n": i })).unwrap();
        }
        let mut entries = store.entries.lock().unwrap().clone();
        let second = entries.remove(1);
        let segment = ChainSegment {
            anchor: None,
            entries,
            unreadable: vec![UnreadableRow {
                id: second.id,
                content_hash: second.content_hash,
                reason: "created_at is not a timestamp".to_string(),
            }],
        };
        let key = key("test-secret-0123456789abcdef0123");

        let full = chain::verify_segment(&segment, &key, VerifyMode::FullScan);
        assert_eq!(full.entries_checked, 3);
        assert_eq!(full.last_verified_id, Some(EntryId(1)));
        let found: Vec<_> = full.violations.iter().map(|v| (v.entry_id, v.kind)).collect();
        assert_eq!(found, vec![(EntryId(2), BreakKind::HashMismatch)]);

        let first = chain::verify_segment(&segment, &key, VerifyMode::FirstBreak);
        assert_eq!(first.entries_checked, 2);
    }

    proptest! {
        #[test]
        fn prop_any_payload_change_changes_hash(
            original in "[ -~]{0,32}",
            replacement in "[ -~]{0,32}",
        ) {
            prop_assume!(original != replacement);
            let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            prop_assert_ne!(
                hash_entry(Some("abc"), &ts, "alice", "upload", &original),
                hash_entry(Some("abc"), &ts, "alice", "upload", &replacement)
            );
        }
    }
}
