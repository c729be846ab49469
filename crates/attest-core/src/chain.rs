//! Hash-chain primitives: canonical payloads, hashing, signing and chain
//! integrity verification.
//!
//! Every field that contributes to an entry's hash is listed explicitly so
//! nothing is accidentally omitted.  Each variable-length field is length
//! prefixed, so two entries whose fields split differently can never feed
//! the same bytes into SHA-256.
//!
//! Hash input layout (bytes, in order):
//!   1. domain tag `attest.entry.v1`
//!   2. previous hash: `0x00` when absent, otherwise `0x01` + field
//!   3. created_at as canonical RFC 3339 (microseconds, `Z`) field
//!   4. actor field
//!   5. action field
//!   6. canonical payload JSON field
//!
//! where "field" = 8-byte big-endian byte length followed by the bytes.
//!
//! The signature is HMAC-SHA256 over the ASCII bytes of the hex
//! `content_hash`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::Mac;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use attest_contracts::{
    entry::{canonical_timestamp, AuditEntry},
    error::{LedgerError, LedgerResult},
    export::LedgerExport,
    query::{ChainSegment, UnreadableRow},
    report::{BreakKind, IntegrityViolation, VerificationReport, VerifyMode},
};

use crate::key::SecretKey;

const DOMAIN_TAG: &[u8] = b"attest.entry.v1";

// ── Canonical payloads ────────────────────────────────────────────────────────

/// Serialize `payload` to canonical JSON: compact, with object keys sorted
/// at every nesting level.
///
/// The same logical data always yields the same bytes, whatever order the
/// caller built its maps in.
pub fn canonical_payload<T: Serialize + ?Sized>(payload: &T) -> LedgerResult<String> {
    let value = serde_json::to_value(payload).map_err(|e| LedgerError::Serialization {
        reason: format!("payload is not representable as JSON: {e}"),
    })?;
    serde_json::to_string(&canonicalize(value)).map_err(|e| LedgerError::Serialization {
        reason: format!("failed to encode canonical payload: {e}"),
    })
}

// `serde_json::Map` iterates sorted unless some crate in the build enables
// `preserve_order`; the explicit sort holds either way.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

// ── Hashing and signing ───────────────────────────────────────────────────────

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Compute the SHA-256 content hash of an entry.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(
    previous_hash: Option<&str>,
    created_at: &DateTime<Utc>,
    actor: &str,
    action: &str,
    payload: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    match previous_hash {
        None => hasher.update([0x00u8]),
        Some(prev) => {
            hasher.update([0x01u8]);
            update_field(&mut hasher, prev.as_bytes());
        }
    }
    update_field(&mut hasher, canonical_timestamp(created_at).as_bytes());
    update_field(&mut hasher, actor.as_bytes());
    update_field(&mut hasher, action.as_bytes());
    update_field(&mut hasher, payload.as_bytes());

    hex::encode(hasher.finalize())
}

/// Recompute the content hash of a stored entry from its own fields.
pub fn recompute_hash(entry: &AuditEntry) -> String {
    hash_entry(
        entry.previous_hash.as_deref(),
        &entry.created_at,
        &entry.actor,
        &entry.action,
        &entry.payload,
    )
}

/// Compute the HMAC-SHA256 signature (lowercase hex) of `content_hash`.
pub fn sign_hash(key: &SecretKey, content_hash: &str) -> String {
    let mut mac = key.mac();
    mac.update(content_hash.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` against `content_hash` in constant time.
///
/// A signature that is not valid hex never matches.
pub fn signature_matches(key: &SecretKey, content_hash: &str, signature: &str) -> bool {
    let Ok(raw) = hex::decode(signature) else {
        return false;
    };
    let mut mac = key.mac();
    mac.update(content_hash.as_bytes());
    mac.verify_slice(&raw).is_ok()
}

// ── Verification ──────────────────────────────────────────────────────────────

/// Run the three per-entry checks in order: linkage, hash, signature.
///
/// Returns the first failing check, if any.
fn check_entry(
    entry: &AuditEntry,
    recomputed: &str,
    expected_prev: Option<&str>,
    key: &SecretKey,
) -> Option<IntegrityViolation> {
    // Rule 1: the stored previous_hash must match the predecessor.
    if entry.previous_hash.as_deref() != expected_prev {
        return Some(IntegrityViolation {
            entry_id: entry.id,
            kind: BreakKind::ChainBreak,
            expected: expected_prev.map(str::to_string),
            found: entry.previous_hash.clone(),
        });
    }

    // Rule 2: the stored content_hash must match the recomputed one.
    if entry.content_hash != recomputed {
        return Some(IntegrityViolation {
            entry_id: entry.id,
            kind: BreakKind::HashMismatch,
            expected: Some(recomputed.to_string()),
            found: Some(entry.content_hash.clone()),
        });
    }

    // Rule 3: the signature must be the HMAC of the (now trusted) hash.
    if !signature_matches(key, &entry.content_hash, &entry.signature) {
        return Some(IntegrityViolation {
            entry_id: entry.id,
            kind: BreakKind::SignatureMismatch,
            expected: Some(sign_hash(key, &entry.content_hash)),
            found: Some(entry.signature.clone()),
        });
    }

    None
}

/// One row in verification order.
enum Row<'a> {
    Entry(&'a AuditEntry),
    Unreadable(&'a UnreadableRow),
}

/// Verify a run of entries in ascending id order.
///
/// `expected_first_prev` is the hash the first entry must link to: `None`
/// at the start of the ledger, otherwise the predecessor's hash.  Each
/// following entry must link to the *recomputed* hash of the one before it.
pub fn verify_entries(
    expected_first_prev: Option<String>,
    entries: &[AuditEntry],
    key: &SecretKey,
    mode: VerifyMode,
) -> VerificationReport {
    verify_rows(expected_first_prev, entries.iter().map(Row::Entry), key, mode)
}

fn verify_rows<'a>(
    expected_first_prev: Option<String>,
    rows: impl Iterator<Item = Row<'a>>,
    key: &SecretKey,
    mode: VerifyMode,
) -> VerificationReport {
    let mut report = VerificationReport::empty();
    let mut expected_prev = expected_first_prev;

    for row in rows {
        report.entries_checked += 1;

        let (violation, next_prev) = match row {
            Row::Entry(entry) => {
                let recomputed = recompute_hash(entry);
                let violation = check_entry(entry, &recomputed, expected_prev.as_deref(), key);
                if violation.is_none() && report.violations.is_empty() {
                    report.last_verified_id = Some(entry.id);
                }
                (violation, recomputed)
            }
            // Nothing can be recomputed; later entries are checked against
            // the stored hash so the report points at this row only.
            Row::Unreadable(raw) => {
                debug!(entry_id = %raw.id, reason = %raw.reason, "stored row does not decode");
                let violation = IntegrityViolation {
                    entry_id: raw.id,
                    kind: BreakKind::HashMismatch,
                    expected: None,
                    found: Some(raw.content_hash.clone()),
                };
                (Some(violation), raw.content_hash.clone())
            }
        };

        if let Some(violation) = violation {
            warn!(
                entry_id = %violation.entry_id,
                kind = %violation.kind,
                "audit chain integrity violation"
            );
            report.violations.push(violation);
            if mode == VerifyMode::FirstBreak {
                break;
            }
        }

        expected_prev = Some(next_prev);
    }

    report.valid = report.violations.is_empty();
    debug!(
        entries_checked = report.entries_checked,
        valid = report.valid,
        "chain segment verified"
    );
    report
}

/// Verify a snapshot segment.  The anchor's recomputed hash seeds the
/// linkage check for the first entry; unreadable rows are merged into the
/// walk by id.
pub fn verify_segment(
    segment: &ChainSegment,
    key: &SecretKey,
    mode: VerifyMode,
) -> VerificationReport {
    let anchor_hash = segment.anchor.as_ref().map(recompute_hash);

    let mut entries = segment.entries.iter().peekable();
    let mut unreadable = segment.unreadable.iter().peekable();
    let rows = std::iter::from_fn(move || {
        let unreadable_first = match (entries.peek(), unreadable.peek()) {
            (Some(e), Some(u)) => u.id < e.id,
            (Some(_), None) => false,
            (None, _) => true,
        };
        if unreadable_first {
            unreadable.next().map(Row::Unreadable)
        } else {
            entries.next().map(Row::Entry)
        }
    });

    verify_rows(anchor_hash, rows, key, mode)
}

/// Verify an exported ledger offline.
pub fn verify_export(export: &LedgerExport, key: &SecretKey, mode: VerifyMode) -> VerificationReport {
    verify_entries(export.anchor_hash.clone(), &export.entries, key, mode)
}

/// Return true when every entry links to the stored hash of the entry
/// before it.  Linkage only; use `verify_entries` for full checks.
pub fn is_linked(entries: &[AuditEntry]) -> bool {
    entries
        .windows(2)
        .all(|pair| pair[1].previous_hash.as_deref() == Some(pair[0].content_hash.as_str()))
}
