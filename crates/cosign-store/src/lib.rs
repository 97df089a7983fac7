//! Storage layer for the cosign multisig engine.
//!
//! This crate provides key-value storage abstractions, the write-through
//! persistence used for pending operations, and the in-memory
//! `MultisigOperationStore` that serialises every operation mutation.

pub mod file;
pub mod operations;
pub mod persistence;

use std::collections::HashMap;
use thiserror::Error;

pub use file::FileStore;
pub use operations::{
    count_distinct_signed, is_threshold_met, MultisigOperationStore, OperationObserver,
};
pub use persistence::{KvPersistence, OperationPersistence};

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("backend error: {0}")]
    BackendError(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for cosign_errors::Error {
    fn from(err: StoreError) -> Self {
        cosign_errors::Error::Persistence(err.to_string())
    }
}

/// Basic key-value store trait
pub trait KVStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Set a key-value pair
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    /// Iterate over keys with a prefix, in key order
    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// In-memory key-value store implementation
#[derive(Debug, Default)]
pub struct MemStore {
    data: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KVStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.data.insert(key, value);
        Ok(())
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut items: Vec<_> = self
            .data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        items.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store() {
        let mut store = MemStore::new();

        assert!(store.get(b"key1").unwrap().is_none());

        store.set(b"key1".to_vec(), b"value1".to_vec()).unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        store.set(b"key1".to_vec(), b"value2".to_vec()).unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value2".to_vec()));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_mem_store_prefix_iterator_sorted() {
        let mut store = MemStore::new();
        store.set(b"ops/b".to_vec(), b"2".to_vec()).unwrap();
        store.set(b"ops/a".to_vec(), b"1".to_vec()).unwrap();
        store.set(b"other".to_vec(), b"x".to_vec()).unwrap();

        let items = store.prefix_iterator(b"ops/").unwrap();
        assert_eq!(
            items,
            vec![
                (b"ops/a".to_vec(), b"1".to_vec()),
                (b"ops/b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn test_store_error_converts_to_persistence() {
        let err: cosign_errors::Error = StoreError::WriteFailed("disk full".into()).into();
        assert_eq!(
            err,
            cosign_errors::Error::Persistence("write failed: disk full".to_string())
        );
    }
}
