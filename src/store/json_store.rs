//! JSON-file result store: one `<id>.json` per job under a results directory
//!
//! The write path goes through a temp file in the same directory followed by
//! a rename, so a concurrent reader of the same id sees either no file or a
//! complete one.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::engine::JobId;

use super::{ResultStore, StoreError};

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        log::info!("json result store at {}", dir.display());
        Ok(Self { dir })
    }

    fn result_path(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn temp_path(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", id))
    }
}

impl ResultStore for JsonFileStore {
    fn put(&self, id: JobId, payload: &Value) -> Result<(), StoreError> {
        let path = self.result_path(id);
        if path.exists() {
            // One put per id; keep the first payload
            return Ok(());
        }

        let temp = self.temp_path(id);
        fs::write(&temp, serde_json::to_vec(payload)?)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<Option<Value>, StoreError> {
        let path = self.result_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn has(&self, id: JobId) -> bool {
        // Size check guards against a file created but not yet renamed over
        self.result_path(id)
            .metadata()
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    fn backend_type(&self) -> &'static str {
        "json-files"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        assert!(!store.has(1));
        store.put(1, &json!({"Ohio": 30.5, "Tennessee": 44.2})).unwrap();

        assert!(store.has(1));
        let payload = store.get(1).unwrap().unwrap();
        assert_eq!(payload["Ohio"], 30.5);
        assert_eq!(payload["Tennessee"], 44.2);
    }

    #[test]
    fn test_missing_id_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert_eq!(store.get(42).unwrap(), None);
    }

    #[test]
    fn test_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        store.put(3, &json!({"v": "first"})).unwrap();
        store.put(3, &json!({"v": "second"})).unwrap();
        assert_eq!(store.get(3).unwrap().unwrap()["v"], "first");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.put(5, &json!({"k": 1})).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["5.json"]);
    }

    #[test]
    fn test_preserves_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        let mut map = serde_json::Map::new();
        map.insert("New Mexico".to_string(), json!(27.7));
        map.insert("Ohio".to_string(), json!(30.5));
        map.insert("Tennessee".to_string(), json!(44.2));
        store.put(9, &Value::Object(map)).unwrap();

        let payload = store.get(9).unwrap().unwrap();
        let keys: Vec<&String> = payload.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["New Mexico", "Ohio", "Tennessee"]);
    }
}
