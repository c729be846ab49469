//! Compliance-advisor reference scenarios.
//!
//! Each scenario is a self-contained module that wires a real `Ledger` to a
//! real store, replays mock activity, and demonstrates one integrity
//! property.  Every scenario returns a `ScenarioOutcome` so callers (the CLI,
//! tests) can check what happened without parsing the printed narrative.

use attest_contracts::report::VerificationReport;

pub mod concurrent_appends;
pub mod document_lifecycle;
pub mod key_mismatch;
pub mod tamper_detection;

/// What a scenario observed.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    /// Entries in the ledger when the scenario finished.
    pub entries: u64,
    /// The final verification report the scenario is about.
    pub report: VerificationReport,
}

/// Print the verification summary in the shared scenario format.
pub(crate) fn print_report(label: &str, report: &VerificationReport) {
    if report.valid {
        println!(
            "  {label:<24}VERIFIED ({} entr{} checked)",
            report.entries_checked,
            if report.entries_checked == 1 { "y" } else { "ies" }
        );
    } else {
        println!("  {label:<24}FAILED");
        for violation in &report.violations {
            println!("    - {violation}");
        }
    }
}
