//! ATTEST: Audit Ledger Operator CLI
//!
//! Appends to, inspects and verifies a configured audit ledger, and runs the
//! compliance-advisor reference scenarios.
//!
//! Usage:
//!   attest --config attest.toml append --actor alice --action upload --payload '{"file":"a.pdf"}'
//!   attest --config attest.toml verify --full-scan
//!   attest --config attest.toml list --actor alice
//!   attest --config attest.toml export --out backup.json
//!   attest scenario all
//!
//! Exit codes: 0 success, 1 error, 2 integrity violation found.

use std::path::{Path, PathBuf};
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use attest_config::AttestConfig;
use attest_contracts::{
    error::{LedgerError, LedgerResult},
    AuditEntry, EntryFilter, EntryId, IdRange, LedgerExport, VerificationReport, VerifyMode,
};
use attest_core::chain;
use attest_ref_advisor::{mock_data, SCENARIOS};

// ── CLI definition ────────────────────────────────────────────────────────────

/// ATTEST: hash-chained, HMAC-signed audit ledger.
#[derive(Parser)]
#[command(
    name = "attest",
    about = "Hash-chained, HMAC-signed audit ledger",
    long_about = "Appends to and verifies a tamper-evident audit ledger.\n\
                  The HMAC secret is read from the environment variable named in the\n\
                  config file (AUDIT_HMAC_KEY by default)."
)]
struct Cli {
    /// Path to a TOML config file.  Defaults to an in-memory ledger.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one entry and print its id.
    Append {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        action: String,
        /// JSON payload.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Verify the chain; exits with code 2 when it is broken.
    Verify {
        #[arg(long)]
        from: Option<u64>,
        #[arg(long)]
        to: Option<u64>,
        /// Report every violation instead of stopping at the first.
        #[arg(long)]
        full_scan: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print one entry.
    Show { id: u64 },
    /// List entries matching every given filter.
    List {
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        action: Option<String>,
        /// RFC 3339 lower bound on created_at (inclusive).
        #[arg(long)]
        since: Option<String>,
    },
    /// Print the newest entry.
    Tail,
    /// Write a JSON export of the ledger (or a range of it).
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        from: Option<u64>,
        #[arg(long)]
        to: Option<u64>,
    },
    /// Verify a previously written export offline.
    VerifyExport {
        file: PathBuf,
        #[arg(long)]
        full_scan: bool,
        #[arg(long)]
        json: bool,
    },
    /// Run a reference scenario (or `all`) with an ephemeral key.
    Scenario { name: String },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("attest error: {e}");
            process::exit(1);
        }
    }
}

/// Dispatch one command.  `Ok(false)` means an integrity violation was found.
fn run(cli: Cli) -> LedgerResult<bool> {
    if let Command::Scenario { name } = &cli.command {
        return run_scenarios(name);
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Append {
            actor,
            action,
            payload,
        } => {
            let payload: Value = serde_json::from_str(&payload).map_err(|e| {
                LedgerError::InvalidInput {
                    reason: format!("--payload is not valid JSON: {e}"),
                }
            })?;
            let id = config.build_ledger()?.append(&actor, &action, &payload)?;
            println!("{id}");
            Ok(true)
        }
        Command::Verify {
            from,
            to,
            full_scan,
            json,
        } => {
            let ledger = config.build_ledger()?;
            let report = ledger.verify_chain_with(id_range(from, to), verify_mode(full_scan))?;
            print_report(&report, json)?;
            Ok(report.valid)
        }
        Command::Show { id } => {
            match config.build_ledger()?.get_entry(EntryId(id))? {
                Some(entry) => print_json(&entry)?,
                None => {
                    return Err(LedgerError::InvalidInput {
                        reason: format!("no entry with id {id}"),
                    })
                }
            }
            Ok(true)
        }
        Command::List {
            actor,
            action,
            since,
        } => {
            let filter = EntryFilter {
                actor,
                action,
                since: since.as_deref().map(parse_since).transpose()?,
            };
            for entry in config.build_ledger()?.list_entries(&filter)? {
                print_line(&entry);
            }
            Ok(true)
        }
        Command::Tail => {
            match config.build_ledger()?.tail()? {
                Some(entry) => print_json(&entry)?,
                None => println!("ledger is empty"),
            }
            Ok(true)
        }
        Command::Export { out, from, to } => {
            let export = config.build_ledger()?.export(id_range(from, to))?;
            write_export(&out, &export)?;
            println!(
                "exported {} entries to {} (terminal hash {})",
                export.entries.len(),
                out.display(),
                export.terminal_hash
            );
            Ok(true)
        }
        Command::VerifyExport {
            file,
            full_scan,
            json,
        } => {
            let export = read_export(&file)?;
            let report = chain::verify_export(&export, &config.secret_key()?, verify_mode(full_scan));
            print_report(&report, json)?;
            Ok(report.valid)
        }
        Command::Scenario { name } => run_scenarios(&name),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> LedgerResult<AttestConfig> {
    match path {
        Some(path) => AttestConfig::from_file(path),
        None => {
            warn!("no --config given; using an in-memory ledger that is discarded on exit");
            Ok(AttestConfig::default())
        }
    }
}

fn id_range(from: Option<u64>, to: Option<u64>) -> IdRange {
    IdRange::new(from.map(EntryId), to.map(EntryId))
}

fn verify_mode(full_scan: bool) -> VerifyMode {
    if full_scan {
        VerifyMode::FullScan
    } else {
        VerifyMode::FirstBreak
    }
}

fn parse_since(s: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| LedgerError::InvalidInput {
            reason: format!("--since '{s}' is not an RFC 3339 timestamp: {e}"),
        })
}

fn print_json<T: serde::Serialize>(value: &T) -> LedgerResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| LedgerError::Serialization {
        reason: e.to_string(),
    })?;
    println!("{rendered}");
    Ok(())
}

fn print_line(entry: &AuditEntry) {
    println!(
        "#{:<6} {}  {:<20} {:<20} {}",
        entry.id,
        entry.created_at_canonical(),
        entry.actor,
        entry.action,
        entry.payload
    );
}

fn print_report(report: &VerificationReport, json: bool) -> LedgerResult<()> {
    if json {
        return print_json(report);
    }
    if report.valid {
        println!("chain VALID ({} entries checked)", report.entries_checked);
    } else {
        println!("chain BROKEN ({} entries checked)", report.entries_checked);
        if let Some(id) = report.last_verified_id {
            println!("  last verified entry: {id}");
        }
        for violation in &report.violations {
            println!("  {violation}");
        }
    }
    Ok(())
}

fn write_export(path: &Path, export: &LedgerExport) -> LedgerResult<()> {
    let rendered = serde_json::to_string_pretty(export).map_err(|e| LedgerError::Serialization {
        reason: e.to_string(),
    })?;
    std::fs::write(path, rendered)
        .map_err(|e| LedgerError::storage(format!("failed to write '{}': {e}", path.display())))
}

fn read_export(path: &Path) -> LedgerResult<LedgerExport> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| LedgerError::storage(format!("failed to read '{}': {e}", path.display())))?;
    serde_json::from_str(&contents).map_err(|e| LedgerError::Serialization {
        reason: format!("'{}' is not a ledger export: {e}", path.display()),
    })
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_scenarios(name: &str) -> LedgerResult<bool> {
    let key = mock_data::demo_key()?;
    print_banner();

    let outcomes = if name == "all" {
        attest_ref_advisor::run_all(&key)?
    } else {
        let outcome = attest_ref_advisor::run_named(name, &key).ok_or_else(|| {
            LedgerError::InvalidInput {
                reason: format!(
                    "unknown scenario '{name}' (expected one of: all, {})",
                    SCENARIOS.join(", ")
                ),
            }
        })??;
        vec![outcome]
    };

    println!("Scenario summary:");
    for outcome in &outcomes {
        let verdict = match outcome.report.first_violation() {
            None => "valid".to_string(),
            Some(v) => format!("{} at entry {}", v.kind, v.entry_id),
        };
        println!("  {:<22} {:>4} entries  {verdict}", outcome.name, outcome.entries);
    }
    println!();
    Ok(true)
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("ATTEST: Hash-chained Audit Ledger");
    println!("Compliance Advisor Reference Demo");
    println!("==================================");
    println!();
    println!("Per append:");
    println!("  [1] Read the chain tail inside the store's write critical section");
    println!("  [2] content_hash = SHA-256(previous_hash, created_at, actor, action, payload)");
    println!("  [3] signature = HMAC-SHA256(secret, content_hash)");
    println!("  [4] Persist with the next id; the entry is now the tail");
    println!();
}
