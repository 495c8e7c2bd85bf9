//! Result store backends
//!
//! One JSON-serializable payload per job id, written exactly once by the
//! worker that executed the job and immutable afterwards. A write must be
//! atomic with respect to a concurrent read of the same id: readers see
//! nothing or a complete payload, never a torn write.

pub mod json_store;
pub mod sqlite_store;

pub use json_store::JsonFileStore;
pub use sqlite_store::SqliteStore;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Mutex;

use serde_json::Value;

use crate::engine::JobId;

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Backend trait for persisting per-job results
pub trait ResultStore: Send + Sync {
    /// Persist the payload for a job id. Called exactly once per id; a
    /// repeated put for the same id keeps the first payload.
    fn put(&self, id: JobId, payload: &Value) -> Result<(), StoreError>;

    /// Fetch the payload for a job id, `None` while the job is running.
    fn get(&self, id: JobId) -> Result<Option<Value>, StoreError>;

    /// True once a complete payload for the id is readable.
    fn has(&self, id: JobId) -> bool;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

/// In-memory store for tests and ephemeral runs
pub struct MemoryStore {
    results: Mutex<HashMap<JobId, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore for MemoryStore {
    fn put(&self, id: JobId, payload: &Value) -> Result<(), StoreError> {
        let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.entry(id).or_insert_with(|| payload.clone());
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<Option<Value>, StoreError> {
        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        Ok(results.get(&id).cloned())
    }

    fn has(&self, id: JobId) -> bool {
        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.contains_key(&id)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
