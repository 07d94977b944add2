//! SQLite backend.
//!
//! Schema:
//! - `elmah_containers`: one row per container with its capped bounds
//! - `"<database>.<container>"`: one table per container. Denormalized
//!   scalar columns are indexed for querying; `xml_error` holds the
//!   canonical form and `document` the full persisted record as JSON.
//!   Error time is kept as whole seconds plus nanoseconds (`time_s`,
//!   `time_nanos`) so listings order at full precision.
//!
//! The connection sits behind a `Mutex`, which serializes bootstrap for
//! every container of this backend instance. Bootstrap and capped eviction
//! run inside `IMMEDIATE` transactions, so other processes sharing the file
//! see them atomically.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, warn};

use crate::backend::{Bootstrap, Connect, ContainerInfo, ErrorLogBackend};
use crate::config::CappedPolicy;
use crate::error::{StoreError, StoreResult};
use crate::record::{PersistedRecord, RecordId};

/// How long a statement waits on a locked database before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const META_TABLE: &str = "elmah_containers";

const RECORD_COLUMNS: &str = "id, error_id, xml_error, time_s, time_nanos, document";

/// SQLite-backed error log backend.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(unavailable)?;
        Self::init(conn, path.display().to_string())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, location: String) -> StoreResult<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(unavailable)?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {META_TABLE} (
                database_name TEXT NOT NULL,
                container_name TEXT NOT NULL,
                capped INTEGER NOT NULL,
                max_bytes INTEGER,
                max_documents INTEGER,
                created_at TEXT NOT NULL,
                PRIMARY KEY (database_name, container_name)
            );
            "#
        ))
        .map_err(unavailable)?;
        debug!(location = %location, "sqlite backend opened");
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Where the database lives (file path or `:memory:`).
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Change the connection-level busy timeout.
    pub fn set_busy_timeout(&self, timeout: Duration) -> StoreResult<()> {
        self.lock()?.busy_timeout(timeout).map_err(unavailable)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(StoreError::poisoned)
    }
}

impl Connect for SqliteBackend {
    /// Accepts `:memory:`, `sqlite::memory:`, `sqlite://<path>` or a bare path.
    fn connect(connection_string: &str) -> StoreResult<Self> {
        let cs = connection_string.trim();
        match cs {
            ":memory:" | "sqlite::memory:" | "sqlite://:memory:" => Self::open_in_memory(),
            _ => {
                let path = cs.strip_prefix("sqlite://").unwrap_or(cs);
                if path.is_empty() {
                    return Err(StoreError::BackendUnavailable(
                        "empty sqlite connection string".into(),
                    ));
                }
                Self::open(path)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Naming and error classification
// ---------------------------------------------------------------------------

fn raw_table_name(database: &str, container: &str) -> String {
    format!("{database}.{container}")
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn table(database: &str, container: &str) -> String {
    quote_ident(&raw_table_name(database, container))
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::BackendUnavailable(e.to_string())
}

fn write_failure(e: rusqlite::Error) -> StoreError {
    if is_busy(&e) {
        unavailable(e)
    } else {
        StoreError::WriteFailure(e.to_string())
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn table_exists(conn: &Connection, raw_name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [raw_name],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

/// `(max_bytes, max_documents)` for a capped container, `None` otherwise.
fn capped_bounds(
    conn: &Connection,
    database: &str,
    container: &str,
) -> rusqlite::Result<Option<(u64, u64)>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT capped, max_bytes, max_documents FROM {META_TABLE} \
                 WHERE database_name = ?1 AND container_name = ?2"
            ),
            params![database, container],
            |row| {
                Ok((
                    row.get::<_, bool>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()?;
    Ok(match row {
        Some((true, Some(bytes), Some(docs))) => {
            Some((bytes.max(0) as u64, docs.max(0) as u64))
        }
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawRow {
    id: i64,
    error_id: String,
    xml_error: String,
    time_s: i64,
    time_nanos: i64,
    document: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            error_id: row.get(1)?,
            xml_error: row.get(2)?,
            time_s: row.get(3)?,
            time_nanos: row.get(4)?,
            document: row.get(5)?,
        })
    }

    /// Rebuild the persisted record. An unreadable denormalized document
    /// falls back to the canonical columns, which are all reads need.
    fn into_record(self) -> PersistedRecord {
        let mut record = match PersistedRecord::from_document(&self.error_id, &self.document) {
            Ok(record) => record,
            Err(e) => {
                warn!(error_id = %self.error_id, error = %e, "unreadable record document; using canonical columns");
                let nanos = u32::try_from(self.time_nanos).unwrap_or_default();
                let time = Utc.timestamp_opt(self.time_s, nanos).single().unwrap_or_default();
                PersistedRecord::canonical_only(self.error_id.clone(), self.xml_error.clone(), time)
            }
        };
        record.id = Some(RecordId(self.id.max(0) as u64));
        // The dedicated columns are authoritative over the document copy.
        record.error_id = self.error_id;
        record.xml_error = self.xml_error;
        record
    }
}

/// Evict the oldest rows (by insertion) until both bounds hold.
fn evict(tx: &Transaction<'_>, table: &str, max_bytes: u64, max_documents: u64) -> rusqlite::Result<u64> {
    let (count, bytes): (i64, i64) = tx.query_row(
        &format!("SELECT COUNT(*), COALESCE(SUM(size), 0) FROM {table}"),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let mut count = count.max(0) as u64;
    let mut bytes = bytes.max(0) as u64;
    if count <= max_documents && bytes <= max_bytes {
        return Ok(0);
    }

    let mut cutoff = None;
    let mut evicted = 0;
    {
        let mut stmt = tx.prepare(&format!("SELECT id, size FROM {table} ORDER BY id ASC"))?;
        let mut rows = stmt.query([])?;
        while count > max_documents || bytes > max_bytes {
            let Some(row) = rows.next()? else { break };
            let id: i64 = row.get(0)?;
            let size: i64 = row.get(1)?;
            count -= 1;
            bytes = bytes.saturating_sub(size.max(0) as u64);
            cutoff = Some(id);
            evicted += 1;
        }
    }
    if let Some(id) = cutoff {
        tx.execute(&format!("DELETE FROM {table} WHERE id <= ?1"), [id])?;
    }
    Ok(evicted)
}

impl ErrorLogBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "SQLite"
    }

    fn ensure_container(
        &self,
        database: &str,
        container: &str,
        policy: &CappedPolicy,
    ) -> StoreResult<Bootstrap> {
        let raw = raw_table_name(database, container);
        let t = quote_ident(&raw);
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(unavailable)?;

        if table_exists(&tx, &raw).map_err(unavailable)? {
            return Ok(Bootstrap::Existing);
        }

        tx.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                error_id TEXT NOT NULL UNIQUE,
                time_s INTEGER NOT NULL,
                time_nanos INTEGER NOT NULL,
                status_code INTEGER NOT NULL,
                type_name TEXT NOT NULL,
                source TEXT NOT NULL,
                host_name TEXT NOT NULL,
                application_name TEXT NOT NULL,
                user_name TEXT NOT NULL,
                message TEXT NOT NULL,
                xml_error TEXT NOT NULL,
                document TEXT NOT NULL,
                size INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {time_idx} ON {t}(time_s DESC, time_nanos DESC, id DESC);
            CREATE INDEX IF NOT EXISTS {app_idx} ON {t}(application_name, time_s);
            CREATE INDEX IF NOT EXISTS {status_idx} ON {t}(status_code);
            "#,
            time_idx = quote_ident(&format!("{raw}.time")),
            app_idx = quote_ident(&format!("{raw}.application")),
            status_idx = quote_ident(&format!("{raw}.status")),
        ))
        .map_err(unavailable)?;

        let (max_bytes, max_documents) = if policy.enabled {
            (
                Some(to_i64(policy.effective_max_bytes())),
                Some(to_i64(policy.effective_max_documents())),
            )
        } else {
            (None, None)
        };
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {META_TABLE} \
                 (database_name, container_name, capped, max_bytes, max_documents, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                database,
                container,
                policy.enabled,
                max_bytes,
                max_documents,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(unavailable)?;
        tx.commit().map_err(unavailable)?;
        Ok(Bootstrap::Created)
    }

    fn container_info(&self, database: &str, container: &str) -> StoreResult<Option<ContainerInfo>> {
        let conn = self.lock()?;
        if !table_exists(&conn, &raw_table_name(database, container)).map_err(unavailable)? {
            return Ok(None);
        }
        let bounds = capped_bounds(&conn, database, container).map_err(unavailable)?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", table(database, container)),
                [],
                |row| row.get(0),
            )
            .map_err(unavailable)?;
        Ok(Some(ContainerInfo {
            capped: bounds.is_some(),
            max_bytes: bounds.map(|(b, _)| b),
            max_documents: bounds.map(|(_, d)| d),
            count: count.max(0) as u64,
        }))
    }

    fn insert(
        &self,
        database: &str,
        container: &str,
        record: PersistedRecord,
    ) -> StoreResult<RecordId> {
        let document = record.to_document()?;
        let size = document.len() as u64;
        let raw = raw_table_name(database, container);
        let t = quote_ident(&raw);

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write_failure)?;

        if !table_exists(&tx, &raw).map_err(write_failure)? {
            return Err(StoreError::WriteFailure(format!(
                "container {raw} does not exist"
            )));
        }
        let bounds = capped_bounds(&tx, database, container).map_err(write_failure)?;
        if let Some((max_bytes, _)) = bounds {
            if size > max_bytes {
                return Err(StoreError::WriteFailure(format!(
                    "record of {size} bytes exceeds capped container size {max_bytes}"
                )));
            }
        }

        tx.execute(
            &format!(
                "INSERT INTO {t} (error_id, time_s, time_nanos, status_code, type_name, source, host_name, \
                 application_name, user_name, message, xml_error, document, size) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                record.error_id,
                record.time.timestamp(),
                i64::from(record.time.timestamp_subsec_nanos()),
                record.status_code,
                record.type_name,
                record.source,
                record.host_name,
                record.application_name,
                record.user,
                record.message,
                record.xml_error,
                document,
                to_i64(size),
            ],
        )
        .map_err(write_failure)?;
        let id = tx.last_insert_rowid();

        if let Some((max_bytes, max_documents)) = bounds {
            let evicted = evict(&tx, &t, max_bytes, max_documents).map_err(write_failure)?;
            if evicted > 0 {
                debug!(container = %raw, evicted, "capped container evicted oldest records");
            }
        }
        tx.commit().map_err(write_failure)?;
        Ok(RecordId(id.max(0) as u64))
    }

    fn find_by_error_id(
        &self,
        database: &str,
        container: &str,
        error_id: &str,
    ) -> StoreResult<Option<PersistedRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM {} WHERE error_id = ?1 ORDER BY id ASC LIMIT 1",
                    table(database, container)
                ),
                [error_id],
                RawRow::from_row,
            )
            .optional()
            .map_err(unavailable)?;
        Ok(row.map(RawRow::into_record))
    }

    fn find_page(
        &self,
        database: &str,
        container: &str,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<PersistedRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM {} ORDER BY time_s DESC, time_nanos DESC, id DESC LIMIT ?1 OFFSET ?2",
                table(database, container)
            ))
            .map_err(unavailable)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let skip = i64::try_from(skip).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit, skip], RawRow::from_row)
            .map_err(unavailable)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(RawRow::into_record).collect())
    }

    fn count(&self, database: &str, container: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", table(database, container)),
                [],
                |row| row.get(0),
            )
            .map_err(unavailable)?;
        Ok(count.max(0) as u64)
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use elmah_types::{CapturedError, ErrorId};
    use std::sync::Arc;
    use std::thread;

    use crate::record::RecordMapper;

    const DB: &str = "test";

    fn record_at(secs: i64) -> PersistedRecord {
        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + ChronoDuration::seconds(secs);
        RecordMapper::json()
            .to_record(
                &ErrorId::new(),
                &CapturedError::at(format!("e{secs}"), time).with_status_code(500),
            )
            .unwrap()
    }

    fn messages(records: &[PersistedRecord]) -> Vec<String> {
        records.iter().map(|r| r.message.clone()).collect()
    }

    fn backend_with(container: &str, policy: &CappedPolicy) -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.ensure_container(DB, container, policy).unwrap();
        backend
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    #[test]
    fn ensure_container_is_idempotent() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let policy = CappedPolicy::uncapped();
        assert_eq!(backend.ensure_container(DB, "c", &policy).unwrap(), Bootstrap::Created);
        assert_eq!(backend.ensure_container(DB, "c", &policy).unwrap(), Bootstrap::Existing);
    }

    #[test]
    fn uncapped_container_info() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        let info = backend.container_info(DB, "c").unwrap().unwrap();
        assert!(!info.capped);
        assert_eq!(info.max_bytes, None);
        assert_eq!(info.count, 0);
    }

    #[test]
    fn capped_container_info_uses_defaults() {
        let backend = backend_with("c", &CappedPolicy::capped(0, None));
        let info = backend.container_info(DB, "c").unwrap().unwrap();
        assert!(info.capped);
        assert_eq!(info.max_bytes, Some(50_000));
        assert_eq!(info.max_documents, Some(10_000));
    }

    #[test]
    fn capped_container_info_custom_size() {
        let backend = backend_with("c", &CappedPolicy::capped(5000, None));
        let info = backend.container_info(DB, "c").unwrap().unwrap();
        assert_eq!(info.max_bytes, Some(5000));
    }

    #[test]
    fn existing_container_keeps_its_bounds() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        assert_eq!(
            backend
                .ensure_container(DB, "c", &CappedPolicy::capped(1000, Some(2)))
                .unwrap(),
            Bootstrap::Existing
        );
        assert!(!backend.container_info(DB, "c").unwrap().unwrap().capped);
    }

    #[test]
    fn missing_container_info_is_none() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.container_info(DB, "nope").unwrap().is_none());
    }

    #[test]
    fn concurrent_bootstrap_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(SqliteBackend::open(dir.path().join("errors.db")).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    backend
                        .ensure_container(DB, "race", &CappedPolicy::capped(0, Some(5)))
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<Bootstrap> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        assert_eq!(outcomes.iter().filter(|o| **o == Bootstrap::Created).count(), 1);
        assert_eq!(
            backend.container_info(DB, "race").unwrap().unwrap().max_documents,
            Some(5)
        );
    }

    // -----------------------------------------------------------------------
    // Insert / find
    // -----------------------------------------------------------------------

    #[test]
    fn insert_and_find_by_error_id() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        let r = record_at(1);
        let id = backend.insert(DB, "c", r.clone()).unwrap();
        let found = backend.find_by_error_id(DB, "c", &r.error_id).unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.xml_error, r.xml_error);
        assert_eq!(found.status_code, 500);
        assert_eq!(found.time, r.time);
        assert!(backend.find_by_error_id(DB, "c", "missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_error_id_is_write_failure() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        let r = record_at(1);
        backend.insert(DB, "c", r.clone()).unwrap();
        let err = backend.insert(DB, "c", r).unwrap_err();
        assert!(matches!(err, StoreError::WriteFailure(_)));
        assert_eq!(backend.count(DB, "c").unwrap(), 1);
    }

    #[test]
    fn insert_into_missing_container_fails() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let err = backend.insert(DB, "nope", record_at(1)).unwrap_err();
        assert!(matches!(err, StoreError::WriteFailure(_)));
    }

    #[test]
    fn find_page_orders_by_time_descending() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        for secs in [3, 1, 5, 2, 4] {
            backend.insert(DB, "c", record_at(secs)).unwrap();
        }
        let page = backend.find_page(DB, "c", 0, 10).unwrap();
        assert_eq!(messages(&page), ["e5", "e4", "e3", "e2", "e1"]);
        let page = backend.find_page(DB, "c", 3, 10).unwrap();
        assert_eq!(messages(&page), ["e2", "e1"]);
        assert!(backend.find_page(DB, "c", 5, 10).unwrap().is_empty());
        assert!(backend.find_page(DB, "c", usize::MAX, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn find_page_orders_below_one_microsecond() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for (message, nanos) in [("later", 900), ("earlier", 100)] {
            let error = CapturedError::at(message, base + ChronoDuration::nanoseconds(nanos));
            let record = RecordMapper::json().to_record(&ErrorId::new(), &error).unwrap();
            backend.insert(DB, "c", record).unwrap();
        }
        let page = backend.find_page(DB, "c", 0, 10).unwrap();
        assert_eq!(messages(&page), ["later", "earlier"]);
    }

    #[test]
    fn canonical_fallback_keeps_nanosecond_time() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        let time = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let r = RecordMapper::json()
            .to_record(&ErrorId::new(), &CapturedError::at("precise", time))
            .unwrap();
        backend.insert(DB, "c", r.clone()).unwrap();
        backend
            .lock()
            .unwrap()
            .execute(&format!("UPDATE {} SET document = '{{'", table(DB, "c")), [])
            .unwrap();
        let found = backend.find_by_error_id(DB, "c", &r.error_id).unwrap().unwrap();
        assert_eq!(found.time, time);
    }

    #[test]
    fn unreadable_document_falls_back_to_canonical_columns() {
        let backend = backend_with("c", &CappedPolicy::uncapped());
        let r = record_at(7);
        backend.insert(DB, "c", r.clone()).unwrap();
        backend
            .lock()
            .unwrap()
            .execute(
                &format!("UPDATE {} SET document = 'garbage'", table(DB, "c")),
                [],
            )
            .unwrap();
        let found = backend.find_by_error_id(DB, "c", &r.error_id).unwrap().unwrap();
        assert_eq!(found.xml_error, r.xml_error);
        assert_eq!(found.time, r.time);
        assert!(found.message.is_empty());
    }

    // -----------------------------------------------------------------------
    // Capped eviction
    // -----------------------------------------------------------------------

    #[test]
    fn capped_by_document_count_evicts_oldest_inserted() {
        let backend = backend_with("c", &CappedPolicy::capped(5_000_000, Some(3)));
        for secs in [50, 40, 30, 20, 10] {
            backend.insert(DB, "c", record_at(secs)).unwrap();
        }
        assert_eq!(backend.count(DB, "c").unwrap(), 3);
        let page = backend.find_page(DB, "c", 0, 10).unwrap();
        assert_eq!(messages(&page), ["e30", "e20", "e10"]);
    }

    #[test]
    fn capped_by_bytes_evicts_until_within_bound() {
        let size = record_at(1).to_document().unwrap().len() as i64;
        let backend = backend_with("c", &CappedPolicy::capped(size * 2 + size / 2, Some(100)));
        for secs in 1..=4 {
            backend.insert(DB, "c", record_at(secs)).unwrap();
        }
        let page = backend.find_page(DB, "c", 0, 10).unwrap();
        assert_eq!(messages(&page), ["e4", "e3"]);
    }

    #[test]
    fn record_larger_than_cap_is_rejected() {
        let backend = backend_with("c", &CappedPolicy::capped(10, Some(100)));
        let err = backend.insert(DB, "c", record_at(1)).unwrap_err();
        assert!(matches!(err, StoreError::WriteFailure(_)));
        assert_eq!(backend.count(DB, "c").unwrap(), 0);
    }

    // -----------------------------------------------------------------------
    // Persistence / connect
    // -----------------------------------------------------------------------

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.db");
        let r = record_at(1);
        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend
                .ensure_container(DB, "c", &CappedPolicy::capped(0, Some(7)))
                .unwrap();
            backend.insert(DB, "c", r.clone()).unwrap();
        }
        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(
            backend
                .ensure_container(DB, "c", &CappedPolicy::uncapped())
                .unwrap(),
            Bootstrap::Existing
        );
        assert_eq!(backend.count(DB, "c").unwrap(), 1);
        assert_eq!(
            backend.container_info(DB, "c").unwrap().unwrap().max_documents,
            Some(7)
        );
        assert!(backend.find_by_error_id(DB, "c", &r.error_id).unwrap().is_some());
    }

    #[test]
    fn connect_variants() {
        assert_eq!(SqliteBackend::connect(":memory:").unwrap().location(), ":memory:");
        assert_eq!(
            SqliteBackend::connect("sqlite::memory:").unwrap().location(),
            ":memory:"
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.db");
        let backend = SqliteBackend::connect(&format!("sqlite://{}", path.display())).unwrap();
        assert_eq!(backend.location(), path.display().to_string());
        assert!(path.exists());
    }

    #[test]
    fn connect_rejects_empty() {
        let err = SqliteBackend::connect("sqlite://").unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable(_)));
    }

    #[test]
    fn open_in_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteBackend::open(dir.path().join("no/such/dir/errors.db")).unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable(_)));
    }
}
