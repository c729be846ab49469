//! Simulated compliance-advisor activity for the ATTEST reference scenarios.
//!
//! All data in this module is hardcoded and fictional.  It stands in for the
//! upload, OCR, risk-classification and reporting services that would call
//! `Ledger::append` in a production deployment.

use serde_json::{json, Value};
use uuid::Uuid;

use attest_contracts::error::LedgerResult;
use attest_core::SecretKey;

/// One auditable action, as a calling service would report it.
#[derive(Debug, Clone)]
pub struct MockEvent {
    pub actor: &'static str,
    pub action: &'static str,
    pub payload: Value,
}

impl MockEvent {
    fn new(actor: &'static str, action: &'static str, payload: Value) -> Self {
        Self {
            actor,
            action,
            payload,
        }
    }
}

// ── Document lifecycle (mock) ────────────────────────────────────────────────

/// The minimal two-step history: alice uploads `a.pdf`, bob deletes it.
pub fn upload_then_delete() -> Vec<MockEvent> {
    vec![
        MockEvent::new("alice", "upload", json!({ "file": "a.pdf" })),
        MockEvent::new("bob", "delete", json!({ "file": "a.pdf" })),
    ]
}

/// A fuller day in the life of one regulatory circular.
///
/// - alice uploads the circular
/// - the OCR service extracts its text
/// - the risk classifier tags it
/// - alice grants carol (external counsel) read access
/// - the report service renders a PDF summary
pub fn circular_review() -> Vec<MockEvent> {
    vec![
        MockEvent::new(
            "alice",
            "upload",
            json!({
                "file": "rbi-circular-kyc-2024-17.pdf",
                "bytes": 482_133,
                "sha256": "6b1f0c0e9a4d4f2a8f3f2a1f1c0d9e8b7a6f5e4d3c2b1a0f9e8d7c6b5a4f3e2d"
            }),
        ),
        MockEvent::new(
            "svc-ocr",
            "ocr_complete",
            json!({ "file": "rbi-circular-kyc-2024-17.pdf", "pages": 14, "lang": "en" }),
        ),
        MockEvent::new(
            "svc-risk-classifier",
            "risk_classified",
            json!({
                "file": "rbi-circular-kyc-2024-17.pdf",
                "risk_type": "KYC/AML",
                "severity": "High",
                "confidence": 0.87
            }),
        ),
        MockEvent::new(
            "alice",
            "access_grant",
            json!({ "file": "rbi-circular-kyc-2024-17.pdf", "grantee": "carol", "scope": "read" }),
        ),
        MockEvent::new(
            "svc-report",
            "report_generated",
            json!({ "source": "rbi-circular-kyc-2024-17.pdf", "report": "kyc-2024-17-summary.pdf" }),
        ),
    ]
}

/// The forged payload used by the tamper scenario.
pub fn forged_payload() -> &'static str {
    r#"{"file":"b.pdf"}"#
}

// ── Keys ─────────────────────────────────────────────────────────────────────

/// A random, process-local key for demo runs.
///
/// Two v4 UUIDs give 244 random bits, rendered as 64 hex characters.
pub fn demo_key() -> LedgerResult<SecretKey> {
    let material = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    SecretKey::new(material.into_bytes())
}
