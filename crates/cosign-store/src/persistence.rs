//! Write-through persistence of pending operations

use crate::{KVStore, MemStore, Result, StoreError};
use cosign_types::{OperationFilter, OperationKey, PendingOperation};
use std::sync::Mutex;

/// Key prefix of operation records
pub const OPERATION_PREFIX: &[u8] = b"ops/";

/// Persistence collaborator invoked synchronously inside store mutations
pub trait OperationPersistence: Send + Sync {
    /// Insert or replace the record of an operation
    fn upsert_operation(&self, operation: &PendingOperation) -> Result<()>;

    /// Read every stored operation matching `filter`
    fn read_all_operations(&self, filter: &OperationFilter) -> Result<Vec<PendingOperation>>;
}

/// Storage key of an operation: `ops/<chain>/<call hash>`
pub fn operation_key(key: &OperationKey) -> Vec<u8> {
    let mut out = OPERATION_PREFIX.to_vec();
    out.extend_from_slice(key.chain_id.as_str().as_bytes());
    out.push(b'/');
    out.extend_from_slice(key.call_hash.to_hex().as_bytes());
    out
}

/// JSON records in any `KVStore`
pub struct KvPersistence<S: KVStore> {
    store: Mutex<S>,
}

impl<S: KVStore> KvPersistence<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Consume the wrapper and return the underlying store
    pub fn into_inner(self) -> Result<S> {
        self.store
            .into_inner()
            .map_err(|e| StoreError::BackendError(format!("Failed to lock store: {e}")))
    }
}

impl KvPersistence<MemStore> {
    pub fn in_memory() -> Self {
        Self::new(MemStore::new())
    }
}

impl<S: KVStore> OperationPersistence for KvPersistence<S> {
    fn upsert_operation(&self, operation: &PendingOperation) -> Result<()> {
        let value = serde_json::to_vec(operation)
            .map_err(|e| StoreError::InvalidValue(format!("Failed to encode operation: {e}")))?;
        let mut store = self
            .store
            .lock()
            .map_err(|e| StoreError::BackendError(format!("Failed to lock store: {e}")))?;
        store.set(operation_key(&operation.key()), value)
    }

    fn read_all_operations(&self, filter: &OperationFilter) -> Result<Vec<PendingOperation>> {
        let store = self
            .store
            .lock()
            .map_err(|e| StoreError::BackendError(format!("Failed to lock store: {e}")))?;

        let mut operations = Vec::new();
        for (key, value) in store.prefix_iterator(OPERATION_PREFIX)? {
            let operation: PendingOperation = serde_json::from_slice(&value).map_err(|e| {
                StoreError::InvalidValue(format!(
                    "Failed to decode {}: {e}",
                    String::from_utf8_lossy(&key)
                ))
            })?;
            if filter.matches(&operation) {
                operations.push(operation);
            }
        }
        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileStore;
    use cosign_types::{
        AccountId, ApprovalEvent, CallHash, ChainId, CryptoFamily, MultisigDescriptor,
        OperationStatus,
    };
    use tempfile::TempDir;

    fn operation(chain: &str, hash: u8) -> PendingOperation {
        let a = AccountId::from([1u8; 32]);
        let b = AccountId::from([2u8; 32]);
        let descriptor =
            MultisigDescriptor::from_accounts(vec![a.clone(), b], 2, CryptoFamily::Standard);
        PendingOperation::new(
            OperationKey::new(ChainId::from(chain), CallHash::from_bytes([hash; 32])),
            descriptor,
            a,
        )
    }

    #[test]
    fn test_operation_key_layout() {
        let key = OperationKey::new(ChainId::from("kusama"), CallHash::from_bytes([0xab; 32]));
        let raw = operation_key(&key);
        assert!(raw.starts_with(b"ops/kusama/0xabab"));
    }

    #[test]
    fn test_upsert_replaces_and_filters() {
        let persistence = KvPersistence::in_memory();
        let mut op = operation("polkadot", 1);
        persistence.upsert_operation(&op).unwrap();
        persistence.upsert_operation(&operation("kusama", 2)).unwrap();

        op.approvals.push(ApprovalEvent::signed(op.depositor.clone()));
        op.status = OperationStatus::Cancelled;
        persistence.upsert_operation(&op).unwrap();

        let all = persistence
            .read_all_operations(&OperationFilter::all())
            .unwrap();
        assert_eq!(all.len(), 2);

        let polkadot = persistence
            .read_all_operations(&OperationFilter::for_chain(ChainId::from("polkadot")))
            .unwrap();
        assert_eq!(polkadot, vec![op]);

        let cancelled = persistence
            .read_all_operations(&OperationFilter::all().with_status(OperationStatus::Cancelled))
            .unwrap();
        assert_eq!(cancelled.len(), 1);
    }

    #[test]
    fn test_file_backed_persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let op = operation("polkadot", 7);
        {
            let persistence = KvPersistence::new(FileStore::open(dir.path()).unwrap());
            persistence.upsert_operation(&op).unwrap();
        }
        let persistence = KvPersistence::new(FileStore::open(dir.path()).unwrap());
        let loaded = persistence
            .read_all_operations(&OperationFilter::all())
            .unwrap();
        assert_eq!(loaded, vec![op]);
    }
}
