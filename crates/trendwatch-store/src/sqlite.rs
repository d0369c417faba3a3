//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use trendwatch_util::{from_storage_timestamp, to_storage_timestamp, TrendKey};

use crate::{AuditEvent, StoreError, StoreResult, TrendMutation, TrendRecord, TrendStore};

const TREND_COLUMNS: &str = "key, title, source, hot_score, created_at, updated_at";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Trend records, one row per identity
            CREATE TABLE IF NOT EXISTS trends (
                key TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK (length(title) > 0),
                source TEXT NOT NULL,
                hot_score REAL NOT NULL CHECK (hot_score >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_trends_created ON trends(created_at);
            CREATE INDEX IF NOT EXISTS idx_trends_updated ON trends(updated_at);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

/// Raw row; timestamps are converted outside the rusqlite closure
struct TrendRow {
    key: String,
    title: String,
    source: String,
    hot_score: f64,
    created_at: String,
    updated_at: String,
}

impl TrendRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            hot_score: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_record(self) -> StoreResult<TrendRecord> {
        let parse = |s: &str| {
            from_storage_timestamp(s)
                .ok_or_else(|| StoreError::Serialization(format!("bad timestamp '{s}' for {}", self.key)))
        };
        Ok(TrendRecord {
            created_at: parse(&self.created_at)?,
            updated_at: parse(&self.updated_at)?,
            key: TrendKey::from_raw(self.key),
            title: self.title,
            source: self.source,
            hot_score: self.hot_score,
        })
    }
}

fn query_trends(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<TrendRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, TrendRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

impl TrendStore for SqliteStore {
    fn get_trend(&self, key: &TrendKey) -> StoreResult<Option<TrendRecord>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!("SELECT {TREND_COLUMNS} FROM trends WHERE key = ?"),
                [key.as_str()],
                TrendRow::from_row,
            )
            .optional()?;

        row.map(TrendRow::into_record).transpose()
    }

    fn apply_batch(&self, mutations: &[TrendMutation]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls everything back
        let tx = conn.transaction()?;

        for mutation in mutations {
            match mutation {
                TrendMutation::Insert(record) => {
                    tx.execute(
                        &format!("INSERT INTO trends ({TREND_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"),
                        params![
                            record.key.as_str(),
                            record.title,
                            record.source,
                            record.hot_score,
                            to_storage_timestamp(&record.created_at),
                            to_storage_timestamp(&record.updated_at),
                        ],
                    )?;
                }
                TrendMutation::Touch {
                    key,
                    hot_score,
                    updated_at,
                } => {
                    let changed = tx.execute(
                        "UPDATE trends SET hot_score = ?, updated_at = ? WHERE key = ?",
                        params![hot_score, to_storage_timestamp(updated_at), key.as_str()],
                    )?;
                    if changed == 0 {
                        return Err(StoreError::NotFound(key.to_string()));
                    }
                }
            }
        }

        tx.commit()?;
        debug!(mutations = mutations.len(), "Trend batch committed");
        Ok(())
    }

    fn latest_trends(&self, limit: usize) -> StoreResult<Vec<TrendRecord>> {
        let conn = self.conn()?;
        query_trends(
            &conn,
            &format!("SELECT {TREND_COLUMNS} FROM trends ORDER BY created_at DESC, key LIMIT ?"),
            [limit as i64],
        )
    }

    fn trends_updated_since(&self, since: DateTime<Local>, limit: usize) -> StoreResult<Vec<TrendRecord>> {
        let conn = self.conn()?;
        query_trends(
            &conn,
            &format!(
                "SELECT {TREND_COLUMNS} FROM trends WHERE updated_at >= ? \
                 ORDER BY hot_score DESC, key LIMIT ?"
            ),
            params![to_storage_timestamp(&since), limit as i64],
        )
    }

    fn count_trends(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trends", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![to_storage_timestamp(&event.timestamp), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = from_storage_timestamp(&timestamp_str).unwrap_or_else(trendwatch_util::now);
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
