//! Scenario 2: Tamper Detection
//!
//! The ledger lives in a SQLite file.  After alice's upload and bob's
//! delete are recorded, a second, raw database connection (standing in for
//! anyone with write access to the file) rewrites entry 1's payload from
//! `a.pdf` to `b.pdf`.
//!
//! - Normal verification stops at entry 1 with `hash_mismatch`.
//! - A full scan also shows the cascade: entry 2 no longer links to the
//!   recomputed hash of entry 1 (`chain_break`).

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection};
use tempfile::TempDir;
use tracing::debug;

use attest_contracts::{
    error::{LedgerError, LedgerResult},
    query::IdRange,
    report::VerifyMode,
};
use attest_core::{Ledger, SecretKey};
use attest_store::SqliteLedgerStore;

use crate::mock_data::{forged_payload, upload_then_delete};
use crate::scenarios::{print_report, ScenarioOutcome};

/// Open a fresh ledger database in a temporary directory.  The directory
/// (database plus WAL side files) is removed when the `TempDir` drops, so
/// it must outlive the store.
fn scratch_store() -> LedgerResult<(TempDir, Arc<SqliteLedgerStore>)> {
    let dir = tempfile::Builder::new()
        .prefix("attest-tamper-")
        .tempdir()
        .map_err(|e| LedgerError::storage(format!("create scratch directory: {e}")))?;
    let store = Arc::new(SqliteLedgerStore::open(&dir.path().join("audit.db"))?);
    debug!(path = ?store.path(), "scratch ledger opened");
    Ok((dir, store))
}

/// Overwrite one entry's payload behind the ledger's back.
fn forge_payload(path: &Path, entry_id: i64, payload: &str) -> LedgerResult<()> {
    let conn = Connection::open(path).map_err(|e| LedgerError::storage(e.to_string()))?;
    conn.execute(
        "UPDATE audit_entries SET payload = ?1 WHERE id = ?2",
        params![payload, entry_id],
    )
    .map_err(|e| LedgerError::storage(e.to_string()))?;
    Ok(())
}

pub fn run_scenario(key: &SecretKey) -> LedgerResult<ScenarioOutcome> {
    println!("=== Scenario 2: Tamper Detection ===");
    println!();

    let (_dir, store) = scratch_store()?;
    let db_path = store
        .path()
        .map(Path::to_path_buf)
        .ok_or_else(|| LedgerError::storage("scratch ledger has no backing file"))?;
    let ledger = Ledger::new(store, key.clone());

    for event in upload_then_delete() {
        ledger.append(event.actor, event.action, &event.payload)?;
    }
    print_report("Before tampering:", &ledger.verify_chain(IdRange::all())?);
    println!();

    println!("  Rewriting entry 1 payload to {} via a raw connection", forged_payload());
    forge_payload(&db_path, 1, forged_payload())?;
    println!();

    let report = ledger.verify_chain(IdRange::all())?;
    print_report("First-break check:", &report);

    let full = ledger.verify_chain_with(IdRange::all(), VerifyMode::FullScan)?;
    print_report("Full scan:", &full);

    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(ScenarioOutcome {
        name: "tamper-detection",
        entries: ledger.len()?,
        report,
    })
}
