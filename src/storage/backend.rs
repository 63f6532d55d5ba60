//! Storage backend traits and in-memory implementations.
//!
//! The structured store holds projects and addressable media; the key-value
//! store holds whole-state blobs and backups as plain strings. Enumeration
//! order of [`ObjectStore::keys`] is the order housekeeping passes process
//! items in, so implementations return keys sorted.

use std::collections::BTreeMap;

use crate::error::LabResult;
use crate::storage::value::StoredValue;

/// Which backend an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    Structured,
    KeyValue,
}

/// Structured key/blob store.
pub trait ObjectStore {
    /// All keys, sorted.
    fn keys(&self) -> LabResult<Vec<String>>;
    fn get(&self, key: &str) -> LabResult<Option<StoredValue>>;
    fn put(&mut self, key: &str, value: StoredValue) -> LabResult<()>;
    /// Returns whether the key existed.
    fn delete(&mut self, key: &str) -> LabResult<bool>;
}

/// Flat string key-value store.
pub trait KvStore {
    /// All keys, sorted.
    fn keys(&self) -> LabResult<Vec<String>>;
    fn get(&self, key: &str) -> LabResult<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> LabResult<()>;
    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> LabResult<bool>;
}

/// In-memory structured store.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    entries: BTreeMap<String, StoredValue>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn keys(&self) -> LabResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn get(&self, key: &str) -> LabResult<Option<StoredValue>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: StoredValue) -> LabResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> LabResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// In-memory key-value store.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    entries: BTreeMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn keys(&self) -> LabResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn get(&self, key: &str) -> LabResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> LabResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> LabResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_object_store() {
        let mut store = MemoryObjectStore::new();
        store.put("b", StoredValue::text("2")).unwrap();
        store.put("a", StoredValue::text("1")).unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap(), Some(StoredValue::text("1")));
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_kv_store() {
        let mut kv = MemoryKvStore::new();
        kv.set("backup_1", "{}".into()).unwrap();
        assert_eq!(kv.get("backup_1").unwrap().as_deref(), Some("{}"));
        assert!(kv.remove("backup_1").unwrap());
        assert!(kv.keys().unwrap().is_empty());
    }
}
