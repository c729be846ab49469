//! # attest-ref-advisor
//!
//! Compliance-advisor reference runtime for the ATTEST audit ledger.
//!
//! Demonstrates four ledger properties using mock activity from a
//! regulatory-document advisor (uploads, OCR, risk classification, reports):
//!
//! 1. **Document Lifecycle**: sequential ids, hash linkage, clean verification.
//! 2. **Tamper Detection**: a payload rewritten directly in SQLite is caught
//!    at the edited entry.
//! 3. **Concurrent Appends**: parallel writers never fork the chain.
//! 4. **Key Mismatch**: the wrong secret yields `signature_mismatch`.
//!
//! All data is hardcoded and fictional.

pub mod mock_data;
pub mod scenarios;

use attest_contracts::error::LedgerResult;
use attest_core::SecretKey;

use scenarios::{
    concurrent_appends, document_lifecycle, key_mismatch, tamper_detection, ScenarioOutcome,
};

/// Scenario names accepted by [`run_named`], in run order.
pub const SCENARIOS: [&str; 4] = [
    "document-lifecycle",
    "tamper-detection",
    "concurrent-appends",
    "key-mismatch",
];

/// Run one scenario by name.  Returns `None` for an unknown name.
pub fn run_named(name: &str, key: &SecretKey) -> Option<LedgerResult<ScenarioOutcome>> {
    let outcome = match name {
        "document-lifecycle" => document_lifecycle::run_scenario(key),
        "tamper-detection" => tamper_detection::run_scenario(key),
        "concurrent-appends" => concurrent_appends::run_scenario(key),
        "key-mismatch" => key_mismatch::run_scenario(key),
        _ => return None,
    };
    Some(outcome)
}

/// Run every scenario in order, stopping at the first error.
pub fn run_all(key: &SecretKey) -> LedgerResult<Vec<ScenarioOutcome>> {
    SCENARIOS
        .iter()
        .filter_map(|name| run_named(name, key))
        .collect()
}
