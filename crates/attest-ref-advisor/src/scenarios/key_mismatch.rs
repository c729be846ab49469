//! Scenario 4: Key Mismatch
//!
//! A verifier holding the wrong secret recomputes every content hash
//! correctly (the chain itself is intact) but no signature matches.  The
//! report says `signature_mismatch` at the first entry: forged entries or a
//! misconfigured key, not a broken chain.

use std::sync::Arc;

use attest_contracts::{error::LedgerResult, query::IdRange};
use attest_core::{Ledger, SecretKey};
use attest_store::InMemoryLedgerStore;

use crate::mock_data::{circular_review, demo_key};
use crate::scenarios::{print_report, ScenarioOutcome};

pub fn run_scenario(key: &SecretKey) -> LedgerResult<ScenarioOutcome> {
    println!("=== Scenario 4: Key Mismatch ===");
    println!();

    let store = Arc::new(InMemoryLedgerStore::new());
    let issuer = Ledger::new(store.clone(), key.clone());
    for event in circular_review() {
        issuer.append(event.actor, event.action, &event.payload)?;
    }

    print_report("Issuer key:", &issuer.verify_chain(IdRange::all())?);

    let outsider = Ledger::new(store, demo_key()?);
    let report = outsider.verify_chain(IdRange::all())?;
    print_report("Different key:", &report);

    println!();
    println!("  Scenario 4 complete.");
    println!();

    Ok(ScenarioOutcome {
        name: "key-mismatch",
        entries: issuer.len()?,
        report,
    })
}
