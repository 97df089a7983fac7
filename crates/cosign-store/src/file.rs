//! File-backed key-value store
//!
//! Each key is stored as one file named after the hex encoding of the key.
//! Writes go to a temporary file first and are renamed into place.

use crate::{KVStore, Result, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const TMP_SUFFIX: &str = ".tmp";

/// Directory-based key-value store
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::BackendError(format!(
                "Failed to create store directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &[u8]) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        Ok(self.dir.join(hex::encode(key)))
    }
}

impl KVStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed(format!("{}: {e}", path.display()))),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let path = self.path_for(&key)?;
        let tmp = path.with_extension(&TMP_SUFFIX[1..]);
        fs::write(&tmp, &value)
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            StoreError::ReadFailed(format!("Failed to read {}: {e}", self.dir.display()))
        })?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StoreError::ReadFailed(format!("Failed to read entry: {e}")))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let Ok(key) = hex::decode(name) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let value = fs::read(entry.path()).map_err(|e| {
                StoreError::ReadFailed(format!("{}: {e}", entry.path().display()))
            })?;
            items.push((key, value));
        }

        items.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_basic_operations() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        assert!(store.get(b"ops/1").unwrap().is_none());
        store.set(b"ops/1".to_vec(), b"one".to_vec()).unwrap();
        assert_eq!(store.get(b"ops/1").unwrap(), Some(b"one".to_vec()));

        store.set(b"ops/1".to_vec(), b"uno".to_vec()).unwrap();
        assert_eq!(store.get(b"ops/1").unwrap(), Some(b"uno".to_vec()));
        assert!(!dir.path().join(format!("{}.tmp", hex::encode(b"ops/1"))).exists());
    }

    #[test]
    fn test_file_store_prefix_iterator() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set(b"ops/b".to_vec(), b"2".to_vec()).unwrap();
        store.set(b"ops/a".to_vec(), b"1".to_vec()).unwrap();
        store.set(b"wallets/a".to_vec(), b"w".to_vec()).unwrap();
        std::fs::write(dir.path().join("not-hex"), b"ignored").unwrap();

        let items = store.prefix_iterator(b"ops/").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, b"ops/a".to_vec());
        assert_eq!(items[1].1, b"2".to_vec());
    }

    #[test]
    fn test_file_store_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set(b"k".to_vec(), b"v".to_vec()).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_empty_key_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(store.get(b""), Err(StoreError::InvalidKey(_))));
    }
}
