//! Durable, append-only SQLite implementation of `LedgerStore`.
//!
//! Appends run in a `BEGIN IMMEDIATE` transaction that reads the tail,
//! seals the entry and inserts it.  `IMMEDIATE` takes SQLite's write lock
//! up front, so writers in other processes queue on the busy timeout
//! instead of reading the same tail.  A `UNIQUE` index on `previous_hash`
//! rejects a fork even if a writer bypasses this store.
//!
//! File-backed stores open a second connection for reads.  In WAL mode it
//! sees the last committed state and never waits for the writer.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Datelike, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension as _, Row, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use attest_contracts::{
    entry::{canonical_timestamp, parse_timestamp, AuditEntry, EntryId, LedgerId},
    error::{LedgerError, LedgerResult},
    query::{ChainSegment, EntryFilter, IdRange, UnreadableRow},
};
use attest_core::traits::{LedgerStore, SealFn};

pub const SCHEMA_VERSION: i64 = 1;

/// Last year whose canonical timestamp text sorts correctly.
const MAX_TEXT_YEAR: i32 = 9999;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta(
  k TEXT PRIMARY KEY,
  v TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_entries(
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at    TEXT NOT NULL,
  actor         TEXT NOT NULL,
  action        TEXT NOT NULL,
  payload       TEXT NOT NULL,
  content_hash  TEXT NOT NULL,
  previous_hash TEXT,
  signature     TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_audit_entries_previous_hash ON audit_entries(previous_hash);
CREATE INDEX IF NOT EXISTS idx_audit_entries_actor ON audit_entries(actor);
CREATE INDEX IF NOT EXISTS idx_audit_entries_action ON audit_entries(action);
CREATE INDEX IF NOT EXISTS idx_audit_entries_created_at ON audit_entries(created_at);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, created_at, actor, action, payload, content_hash, previous_hash, signature FROM audit_entries";

// ── Error context ─────────────────────────────────────────────────────────────

trait StorageContext<T> {
    fn ctx(self, what: &str) -> LedgerResult<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn ctx(self, what: &str) -> LedgerResult<T> {
        self.map_err(|e| LedgerError::Storage {
            reason: format!("{what}: {e}"),
        })
    }
}

// ── Row decoding ──────────────────────────────────────────────────────────────

/// A row as stored, before timestamp and id conversion.
struct RawEntry {
    id: i64,
    created_at: String,
    actor: String,
    action: String,
    payload: String,
    content_hash: String,
    previous_hash: Option<String>,
    signature: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            actor: row.get(2)?,
            action: row.get(3)?,
            payload: row.get(4)?,
            content_hash: row.get(5)?,
            previous_hash: row.get(6)?,
            signature: row.get(7)?,
        })
    }

    fn into_entry(self) -> LedgerResult<AuditEntry> {
        let id = u64::try_from(self.id).map_err(|_| LedgerError::Serialization {
            reason: format!("stored entry has negative id {}", self.id),
        })?;
        let created_at = parse_timestamp(&self.created_at).map_err(|e| LedgerError::Serialization {
            reason: format!("entry {id} has unreadable created_at '{}': {e}", self.created_at),
        })?;
        Ok(AuditEntry {
            id: EntryId(id),
            created_at,
            actor: self.actor,
            action: self.action,
            payload: self.payload,
            content_hash: self.content_hash,
            previous_hash: self.previous_hash,
            signature: self.signature,
        })
    }
}

/// Decode a row on the verification path.  A row that does not decode is an
/// integrity failure of that entry, so it comes back as data.
fn checked_entry(raw: RawEntry) -> Result<AuditEntry, UnreadableRow> {
    let id = EntryId(u64::try_from(raw.id).unwrap_or(0));
    let content_hash = raw.content_hash.clone();
    raw.into_entry().map_err(|e| UnreadableRow {
        id,
        content_hash,
        reason: e.to_string(),
    })
}

fn sql_id(id: EntryId) -> i64 {
    i64::try_from(id.0).unwrap_or(i64::MAX)
}

/// Smallest microsecond-precision instant `>= ts`, so a string comparison
/// on canonical timestamps matches `created_at >= ts` exactly.
///
/// `None` when that instant is past year 9999: its RFC 3339 form no longer
/// sorts after four-digit years, and no stored entry can be that late.
fn since_key(ts: DateTime<Utc>) -> Option<String> {
    let truncated = ts.trunc_subsecs(6);
    let bound = if truncated < ts {
        truncated + chrono::Duration::microseconds(1)
    } else {
        truncated
    };
    (bound.year() <= MAX_TEXT_YEAR).then(|| canonical_timestamp(&bound))
}

fn collect_raw(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    what: &str,
) -> LedgerResult<Vec<RawEntry>> {
    let mut stmt = conn.prepare(sql).ctx(what)?;
    let raws = stmt
        .query_map(params, RawEntry::from_row)
        .ctx(what)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .ctx(what)?;
    Ok(raws)
}

fn collect_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    what: &str,
) -> LedgerResult<Vec<AuditEntry>> {
    collect_raw(conn, sql, params, what)?
        .into_iter()
        .map(RawEntry::into_entry)
        .collect()
}

fn single_entry(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    what: &str,
) -> LedgerResult<Option<AuditEntry>> {
    conn.query_row(sql, params, RawEntry::from_row)
        .optional()
        .ctx(what)?
        .map(RawEntry::into_entry)
        .transpose()
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// An append-only audit store in a SQLite database.
pub struct SqliteLedgerStore {
    ledger_id: LedgerId,
    path: Option<PathBuf>,
    writer: Mutex<Connection>,
    /// Separate read connection; `None` for in-memory databases, which
    /// cannot be shared between connections.
    reader: Option<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedgerStore")
            .field("ledger_id", &self.ledger_id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteLedgerStore {
    /// Open (or create) the ledger database at `path`.
    ///
    /// Creates parent directories and the schema as needed.  A new database
    /// gets a fresh `LedgerId`; an existing one keeps its own.  Databases
    /// written with a different schema version are refused.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::Storage {
                reason: format!("create ledger directory {}: {e}", parent.display()),
            })?;
        }

        let mut writer = Connection::open(path)
            .ctx(&format!("open ledger database {}", path.display()))?;
        writer.busy_timeout(BUSY_TIMEOUT).ctx("set busy timeout")?;
        let mode: String = writer
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .ctx("enable WAL journal")?;
        writer
            .pragma_update(None, "synchronous", "FULL")
            .ctx("set synchronous mode")?;
        debug!(journal_mode = %mode, "sqlite journal configured");
        let ledger_id = init_schema(&mut writer)?;

        let reader = Connection::open(path)
            .ctx(&format!("open reader for {}", path.display()))?;
        reader.busy_timeout(BUSY_TIMEOUT).ctx("set reader busy timeout")?;

        info!(ledger_id = %ledger_id, path = %path.display(), "sqlite ledger opened");

        Ok(Self {
            ledger_id,
            path: Some(path.to_path_buf()),
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
        })
    }

    /// Open a private in-memory database.  One connection serves both reads
    /// and writes.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let mut conn = Connection::open_in_memory().ctx("open in-memory ledger")?;
        let ledger_id = init_schema(&mut conn)?;
        Ok(Self {
            ledger_id,
            path: None,
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock_writer(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|e| LedgerError::Storage {
            reason: format!("ledger writer lock poisoned: {e}"),
        })
    }

    fn lock_reader(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        let conn = self.reader.as_ref().unwrap_or(&self.writer);
        conn.lock().map_err(|e| LedgerError::Storage {
            reason: format!("ledger reader lock poisoned: {e}"),
        })
    }
}

/// Create tables, then read or initialize the `meta` rows.
fn init_schema(conn: &mut Connection) -> LedgerResult<LedgerId> {
    conn.execute_batch(SCHEMA).ctx("create schema")?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .ctx("begin meta transaction")?;

    let stored: Option<String> = tx
        .query_row("SELECT v FROM meta WHERE k='ledger_id'", [], |row| row.get(0))
        .optional()
        .ctx("read ledger_id")?;

    let ledger_id = match stored {
        Some(raw) => {
            let version: i64 = tx
                .query_row("SELECT v FROM meta WHERE k='schema_version'", [], |row| {
                    row.get::<_, String>(0)
                })
                .ctx("read schema_version")?
                .parse()
                .map_err(|e| LedgerError::storage(format!("parse schema_version: {e}")))?;
            if version != SCHEMA_VERSION {
                return Err(LedgerError::storage(format!(
                    "unsupported schema_version {version} (expected {SCHEMA_VERSION})"
                )));
            }
            let uuid = Uuid::parse_str(&raw)
                .map_err(|e| LedgerError::storage(format!("parse ledger_id '{raw}': {e}")))?;
            LedgerId(uuid)
        }
        None => {
            let ledger_id = LedgerId::new();
            let created_at = canonical_timestamp(&Utc::now());
            let version = SCHEMA_VERSION.to_string();
            for (k, v) in [
                ("ledger_id", ledger_id.to_string()),
                ("created_at", created_at),
                ("schema_version", version),
            ] {
                tx.execute("INSERT INTO meta(k, v) VALUES (?1, ?2)", params![k, v])
                    .ctx("write meta")?;
            }
            debug!(ledger_id = %ledger_id, "initialized new ledger metadata");
            ledger_id
        }
    };

    tx.commit().ctx("commit meta transaction")?;
    Ok(ledger_id)
}

// ── LedgerStore impl ──────────────────────────────────────────────────────────

impl LedgerStore for SqliteLedgerStore {
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    /// Read tail, seal and insert inside one `IMMEDIATE` transaction.
    ///
    /// Any early return drops the transaction, which rolls it back: a failed
    /// append leaves no row behind.
    fn append(&self, seal: &SealFn<'_>) -> LedgerResult<AuditEntry> {
        let mut conn = self.lock_writer()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin append transaction")?;

        let tail: Option<String> = tx
            .query_row(
                "SELECT content_hash FROM audit_entries ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .ctx("read chain tail")?;

        let sealed = seal(tail.as_deref())?;

        tx.execute(
            "INSERT INTO audit_entries(created_at, actor, action, payload, content_hash, previous_hash, signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                canonical_timestamp(&sealed.created_at),
                sealed.actor,
                sealed.action,
                sealed.payload,
                sealed.content_hash,
                sealed.previous_hash,
                sealed.signature,
            ],
        )
        .ctx("insert audit entry")?;
        let rowid = tx.last_insert_rowid();

        tx.commit().ctx("commit audit entry")?;

        let id = EntryId(u64::try_from(rowid).map_err(|_| {
            LedgerError::storage(format!("sqlite assigned a negative id {rowid}"))
        })?);
        debug!(entry_id = %id, "entry committed to sqlite");
        Ok(sealed.into_entry(id))
    }

    fn get(&self, id: EntryId) -> LedgerResult<Option<AuditEntry>> {
        let conn = self.lock_reader()?;
        single_entry(
            &conn,
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![sql_id(id)],
            "read entry",
        )
    }

    /// Anchor and range are read inside one read transaction, so both come
    /// from the same committed snapshot.  Rows that no longer decode are
    /// returned in `unreadable` for verification to report.
    fn snapshot(&self, range: IdRange) -> LedgerResult<ChainSegment> {
        let mut conn = self.lock_reader()?;
        let tx = conn.transaction().ctx("begin snapshot")?;

        let mut unreadable = Vec::new();

        let anchor_raw = match range.from {
            Some(from) => tx
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id < ?1 ORDER BY id DESC LIMIT 1"),
                    params![sql_id(from)],
                    RawEntry::from_row,
                )
                .optional()
                .ctx("read anchor entry")?,
            None => None,
        };
        let anchor = match anchor_raw.map(checked_entry) {
            Some(Ok(entry)) => Some(entry),
            Some(Err(row)) => {
                unreadable.push(row);
                None
            }
            None => None,
        };

        let from = range.from.map_or(0, sql_id);
        let to = range.to.map_or(i64::MAX, sql_id);
        let raws = collect_raw(
            &tx,
            &format!("{SELECT_COLUMNS} WHERE id >= ?1 AND id <= ?2 ORDER BY id ASC"),
            params![from, to],
            "read entry range",
        )?;
        let mut entries = Vec::with_capacity(raws.len());
        for raw in raws {
            match checked_entry(raw) {
                Ok(entry) => entries.push(entry),
                Err(row) => unreadable.push(row),
            }
        }

        tx.finish().ctx("end snapshot")?;
        Ok(ChainSegment {
            anchor,
            entries,
            unreadable,
        })
    }

    fn query(&self, filter: &EntryFilter) -> LedgerResult<Vec<AuditEntry>> {
        let since = match filter.since.map(since_key) {
            Some(None) => return Ok(Vec::new()),
            Some(key) => key,
            None => None,
        };
        let conn = self.lock_reader()?;
        collect_entries(
            &conn,
            &format!(
                "{SELECT_COLUMNS}
                 WHERE (?1 IS NULL OR actor = ?1)
                   AND (?2 IS NULL OR action = ?2)
                   AND (?3 IS NULL OR created_at >= ?3)
                 ORDER BY id ASC"
            ),
            params![filter.actor, filter.action, since],
            "query entries",
        )
    }

    fn tail(&self) -> LedgerResult<Option<AuditEntry>> {
        let conn = self.lock_reader()?;
        single_entry(
            &conn,
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 1"),
            [],
            "read chain tail",
        )
    }

    fn count(&self) -> LedgerResult<u64> {
        let conn = self.lock_reader()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))
            .ctx("count entries")?;
        Ok(n.max(0) as u64)
    }
}
