//! Directory-backed stores used by the CLI.
//!
//! Layout under the root directory:
//!
//! ```text
//! objects/<key>.txt    StoredValue::Text
//! objects/<key>.json   StoredValue::Json
//! objects/<key>.blob   StoredValue::Blob (content type line, then raw bytes)
//! kv/<key>             key-value entries
//! ```
//!
//! Keys are percent-encoded so any key maps to a single file name.

use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{LabError, LabResult};
use crate::storage::backend::{KvStore, ObjectStore};
use crate::storage::value::StoredValue;

const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

const EXT_TEXT: &str = "txt";
const EXT_JSON: &str = "json";
const EXT_BLOB: &str = "blob";

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

fn decode_key(name: &str) -> LabResult<String> {
    percent_decode_str(name)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| LabError::storage(format!("bad file name '{}': {}", name, e)))
}

/// Writes through a temporary file so a crash never leaves a torn value.
fn write_atomic(path: &Path, bytes: &[u8]) -> LabResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Structured store persisted as one file per key.
#[derive(Debug, Clone)]
pub struct DirObjectStore {
    dir: PathBuf,
}

impl DirObjectStore {
    pub fn open(root: &Path) -> LabResult<Self> {
        let dir = root.join("objects");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), ext))
    }

    fn existing_path(&self, key: &str) -> Option<(PathBuf, &'static str)> {
        [EXT_TEXT, EXT_JSON, EXT_BLOB]
            .into_iter()
            .map(|ext| (self.path_for(key, ext), ext))
            .find(|(path, _)| path.is_file())
    }
}

impl ObjectStore for DirObjectStore {
    fn keys(&self) -> LabResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if matches!(ext, EXT_TEXT | EXT_JSON | EXT_BLOB) {
                keys.push(decode_key(stem)?);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> LabResult<Option<StoredValue>> {
        let Some((path, ext)) = self.existing_path(key) else {
            return Ok(None);
        };
        let value = match ext {
            EXT_TEXT => StoredValue::Text(fs::read_to_string(&path)?),
            EXT_JSON => StoredValue::Json(serde_json::from_slice(&fs::read(&path)?)?),
            _ => {
                let raw = fs::read(&path)?;
                let split = raw
                    .iter()
                    .position(|b| *b == b'\n')
                    .ok_or_else(|| LabError::storage(format!("blob '{}' has no header", key)))?;
                let content_type = String::from_utf8_lossy(&raw[..split]).into_owned();
                StoredValue::blob(raw[split + 1..].to_vec(), content_type)
            }
        };
        Ok(Some(value))
    }

    fn put(&mut self, key: &str, value: StoredValue) -> LabResult<()> {
        let (ext, raw) = match value {
            StoredValue::Text(s) => (EXT_TEXT, s.into_bytes()),
            StoredValue::Json(v) => (EXT_JSON, serde_json::to_vec(&v)?),
            StoredValue::Blob {
                bytes,
                content_type,
            } => {
                let mut raw = Vec::with_capacity(content_type.len() + 1 + bytes.len());
                raw.extend_from_slice(content_type.as_bytes());
                raw.push(b'\n');
                raw.extend_from_slice(&bytes);
                (EXT_BLOB, raw)
            }
        };
        let old = self.existing_path(key);
        write_atomic(&self.path_for(key, ext), &raw)?;
        // The old value goes only once the new one is on disk.
        if let Some((old, old_ext)) = old {
            if old_ext != ext {
                fs::remove_file(old)?;
            }
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> LabResult<bool> {
        match self.existing_path(key) {
            Some((path, _)) => {
                fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Key-value store persisted as one file per key.
#[derive(Debug, Clone)]
pub struct DirKvStore {
    dir: PathBuf,
}

impl DirKvStore {
    pub fn open(root: &Path) -> LabResult<Self> {
        let dir = root.join("kv");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(encode_key(key))
    }
}

impl KvStore for DirKvStore {
    fn keys(&self) -> LabResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                keys.push(decode_key(name)?);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> LabResult<Option<String>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: String) -> LabResult<()> {
        write_atomic(&self.path_for(key), value.as_bytes())
    }

    fn remove(&mut self, key: &str) -> LabResult<bool> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_store_persists_all_representations() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirObjectStore::open(tmp.path()).unwrap();

        store.put("media-images-a", StoredValue::text("data:image/png;base64,AA")).unwrap();
        store.put("media-audio-b", StoredValue::blob(vec![0, b'\n', 7], "audio/mpeg")).unwrap();
        store.put("settings/odd key", StoredValue::Json(serde_json::json!({"x": 1}))).unwrap();

        let reopened = DirObjectStore::open(tmp.path()).unwrap();
        assert_eq!(
            reopened.keys().unwrap(),
            vec!["media-audio-b", "media-images-a", "settings/odd key"]
        );
        assert_eq!(
            reopened.get("media-audio-b").unwrap(),
            Some(StoredValue::blob(vec![0, b'\n', 7], "audio/mpeg"))
        );
        assert_eq!(
            reopened.get("settings/odd key").unwrap(),
            Some(StoredValue::Json(serde_json::json!({"x": 1})))
        );
    }

    #[test]
    fn test_object_store_replaces_representation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirObjectStore::open(tmp.path()).unwrap();

        store.put("media-images-a", StoredValue::text("data:image/png;base64,AA")).unwrap();
        store.put("media-images-a", StoredValue::blob(vec![1, 2], "image/jpeg")).unwrap();

        assert_eq!(store.keys().unwrap(), vec!["media-images-a"]);
        assert_eq!(
            store.get("media-images-a").unwrap(),
            Some(StoredValue::blob(vec![1, 2], "image/jpeg"))
        );
        assert!(store.delete("media-images-a").unwrap());
        assert!(store.get("media-images-a").unwrap().is_none());
    }

    #[test]
    fn test_failed_rewrite_keeps_old_value() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirObjectStore::open(tmp.path()).unwrap();
        store.put("media-images-a", StoredValue::text("ORIGINAL")).unwrap();

        // A directory where the temp file goes makes every write fail.
        fs::create_dir_all(tmp.path().join("objects").join("media-images-a.tmp")).unwrap();

        assert!(store.put("media-images-a", StoredValue::text("NEW")).is_err());
        assert!(store
            .put("media-images-a", StoredValue::blob(vec![9], "image/png"))
            .is_err());
        assert_eq!(
            store.get("media-images-a").unwrap(),
            Some(StoredValue::text("ORIGINAL"))
        );
        assert_eq!(store.keys().unwrap(), vec!["media-images-a"]);
    }

    #[test]
    fn test_kv_store() {
        let tmp = tempfile::tempdir().unwrap();
        let mut kv = DirKvStore::open(tmp.path()).unwrap();

        kv.set("backup_2024-01-01T00-00-00-000Z", "{}".into()).unwrap();
        kv.set("idea-lab-storage", "{\"state\":{}}".into()).unwrap();

        assert_eq!(
            kv.keys().unwrap(),
            vec!["backup_2024-01-01T00-00-00-000Z", "idea-lab-storage"]
        );
        assert!(kv.remove("idea-lab-storage").unwrap());
        assert!(!kv.remove("idea-lab-storage").unwrap());
    }
}
