//! SQLite result store backend
//!
//! Alternative to the JSON-file store for deployments that want a single
//! artifact. Payloads are stored as serialized JSON text; `INSERT OR
//! IGNORE` keeps the first write for an id, and SQLite's transactional
//! writes give the nothing-or-complete read guarantee.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde_json::Value;

use crate::engine::JobId;

use super::{ResultStore, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path.as_ref())
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY,
                payload TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        log::info!("sqlite result store at {}", db_path.as_ref().display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ResultStore for SqliteStore {
    fn put(&self, id: JobId, payload: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(payload)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR IGNORE INTO results (id, payload) VALUES (?1, ?2)",
            rusqlite::params![id as i64, text],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<Option<Value>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn
            .prepare("SELECT payload FROM results WHERE id = ?1")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut rows = stmt
            .query(rusqlite::params![id as i64])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match rows.next().map_err(|e| StoreError::Database(e.to_string()))? {
            Some(row) => {
                let text: String = row
                    .get(0)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                Ok(Some(serde_json::from_str(&text)?))
            }
            None => Ok(None),
        }
    }

    fn has(&self, id: JobId) -> bool {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            "SELECT 1 FROM results WHERE id = ?1",
            rusqlite::params![id as i64],
            |_| Ok(()),
        )
        .is_ok()
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
