//! Scenario 1: Document Lifecycle
//!
//! alice uploads `a.pdf`, bob deletes it.  The two entries get ids 1 and 2,
//! entry 2 links to entry 1's content hash, and the chain verifies.  A
//! longer circular-review history is then appended on top to show the chain
//! keeps verifying as it grows.

use std::sync::Arc;

use attest_contracts::{error::LedgerResult, query::IdRange};
use attest_core::{Ledger, SecretKey};
use attest_store::InMemoryLedgerStore;

use crate::mock_data::{circular_review, upload_then_delete};
use crate::scenarios::{print_report, ScenarioOutcome};

pub fn run_scenario(key: &SecretKey) -> LedgerResult<ScenarioOutcome> {
    println!("=== Scenario 1: Document Lifecycle ===");
    println!();

    let ledger = Ledger::new(Arc::new(InMemoryLedgerStore::new()), key.clone());

    // ── Two-step history ──────────────────────────────────────────────────────

    for event in upload_then_delete() {
        let entry = ledger.append_entry(event.actor, event.action, &event.payload)?;
        println!(
            "  #{:<3} {:<8} {:<8} {}",
            entry.id, entry.actor, entry.action, entry.payload
        );
        println!(
            "        previous_hash: {}",
            entry.previous_hash.as_deref().unwrap_or("<none>")
        );
        println!("        content_hash:  {}", entry.content_hash);
    }
    println!();

    print_report("Two-entry chain:", &ledger.verify_chain(IdRange::all())?);

    // ── Growing the chain ─────────────────────────────────────────────────────

    for event in circular_review() {
        ledger.append(event.actor, event.action, &event.payload)?;
    }

    let report = ledger.verify_chain(IdRange::all())?;
    print_report("After circular review:", &report);

    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(ScenarioOutcome {
        name: "document-lifecycle",
        entries: ledger.len()?,
        report,
    })
}
