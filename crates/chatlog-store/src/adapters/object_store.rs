//! Keyed object store backed by SQLite.

use crate::adapter::{AdapterState, FetchOutcome, MessageAdapter};
use crate::error::StoreError;
use crate::model::{Message, MessageId};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

/// Schema version stamped into `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// Canonical durable adapter: one row per record keyed by message id, so
/// every upsert and delete is atomic and never rewrites other records.
///
/// The connection is opened on first use and cached. Enumeration order is
/// key order, which is not necessarily chronological.
pub struct ObjectStoreAdapter {
    /// Database file, or `None` for a private in-memory database.
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl ObjectStoreAdapter {
    /// Create an adapter for a database file. The file and its parent
    /// directory are created lazily.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: Mutex::new(None),
        }
    }

    /// Create an adapter over a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: Mutex::new(None),
        }
    }

    /// Database file path, if file backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the cached connection, opening it first if needed.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = Some(self.open_connection()?);
        }
        let Some(conn) = guard.as_ref() else {
            return Err(StoreError::StorageUnavailable(
                "connection was not cached".to_string(),
            ));
        };
        f(conn)
    }

    fn open_connection(&self) -> Result<Connection, StoreError> {
        let conn = match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(path)?;
                conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                conn
            }
            None => Connection::open_in_memory()?,
        };
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        match version {
            0 => {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS messages (
                        id     INTEGER PRIMARY KEY,
                        record TEXT NOT NULL
                    );
                    PRAGMA user_version = {SCHEMA_VERSION};"
                ))?;
            }
            SCHEMA_VERSION => {}
            other => return Err(StoreError::UnsupportedSchema(other)),
        }
        info!(
            "opened message object store (path={}, schema={SCHEMA_VERSION})",
            self.path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(conn)
    }
}

#[async_trait]
impl MessageAdapter for ObjectStoreAdapter {
    fn name(&self) -> &'static str {
        "object_store"
    }

    fn state(&self) -> AdapterState {
        if self.conn.lock().is_some() {
            AdapterState::Open
        } else {
            AdapterState::Unopened
        }
    }

    async fn persist(&self, message: &Message) -> Result<(), StoreError> {
        let raw = serde_json::to_string(message)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, record) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET record = excluded.record",
                params![message.id, raw],
            )?;
            Ok(())
        })?;
        debug!("persisted message row (id={})", message.id);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<FetchOutcome, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, record FROM messages ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                let id: MessageId = row.get(0)?;
                let raw = row.get::<_, String>(1).map_err(|err| err.to_string());
                Ok((id, raw))
            })?;
            let mut outcome = FetchOutcome::default();
            for row in rows {
                match row? {
                    (id, Ok(raw)) => outcome.push_raw(id.to_string(), &raw),
                    (id, Err(reason)) => outcome.push_malformed(id.to_string(), reason),
                }
            }
            Ok(outcome)
        })
    }

    async fn delete_by_id(&self, id: MessageId) -> Result<(), StoreError> {
        let removed = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?)
        })?;
        debug!("deleted message row (id={id}, removed={removed})");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let removed =
            self.with_conn(|conn| Ok(conn.execute("DELETE FROM messages", [])?))?;
        info!("cleared message object store (removed={removed})");
        Ok(())
    }
}
