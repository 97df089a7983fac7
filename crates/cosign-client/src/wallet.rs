//! Wallet registry boundary and an in-memory implementation

use async_trait::async_trait;
use cosign_errors::{Error, Result};
use cosign_types::{AccountId, Wallet, WalletDraft};
use tokio::sync::RwLock;
use tracing::info;

/// Owner of the user's wallets
#[async_trait]
pub trait WalletRegistry: Send + Sync {
    /// Wallet holding an account with this identity
    async fn find_by_account_identity(&self, account_id: &AccountId) -> Result<Option<Wallet>>;

    /// Persist a new wallet
    async fn create_wallet(&self, draft: WalletDraft) -> Result<Wallet>;

    async fn list_wallets(&self) -> Result<Vec<Wallet>>;
}

/// Registry kept in memory for the lifetime of a session
#[derive(Default)]
pub struct MemoryWalletRegistry {
    wallets: RwLock<Vec<Wallet>>,
}

impl MemoryWalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallets(wallets: Vec<Wallet>) -> Self {
        Self {
            wallets: RwLock::new(wallets),
        }
    }
}

#[async_trait]
impl WalletRegistry for MemoryWalletRegistry {
    async fn find_by_account_identity(&self, account_id: &AccountId) -> Result<Option<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .iter()
            .find(|wallet| wallet.holds_account(account_id))
            .cloned())
    }

    async fn create_wallet(&self, draft: WalletDraft) -> Result<Wallet> {
        let mut wallets = self.wallets.write().await;
        for account in &draft.accounts {
            if let Some(existing) = wallets.iter().find(|w| w.holds_account(&account.account_id)) {
                return Err(Error::Wallet(format!(
                    "account {} already held by wallet {}",
                    account.account_id, existing.id
                )));
            }
        }

        let id = wallets.iter().map(|w| w.id).max().map_or(1, |max| max + 1);
        let wallet = draft.into_wallet(id);
        info!(wallet = id, name = %wallet.name, "created wallet");
        wallets.push(wallet.clone());
        Ok(wallet)
    }

    async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        Ok(self.wallets.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_types::{CryptoFamily, MultisigDescriptor};

    fn draft(byte: u8) -> WalletDraft {
        let descriptor = MultisigDescriptor::from_accounts(
            vec![AccountId::from([1u8; 32]), AccountId::from([2u8; 32])],
            2,
            CryptoFamily::Standard,
        );
        WalletDraft::multisig("Treasury", AccountId::from([byte; 32]), None, descriptor)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let registry = MemoryWalletRegistry::new();
        let first = registry.create_wallet(draft(9)).await.unwrap();
        let second = registry.create_wallet(draft(8)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let found = registry
            .find_by_account_identity(&AccountId::from([8u8; 32]))
            .await
            .unwrap();
        assert_eq!(found, Some(second));
        assert!(registry
            .find_by_account_identity(&AccountId::from([7u8; 32]))
            .await
            .unwrap()
            .is_none());
        assert_eq!(registry.list_wallets().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let registry = MemoryWalletRegistry::new();
        registry.create_wallet(draft(9)).await.unwrap();
        assert!(matches!(
            registry.create_wallet(draft(9)).await,
            Err(Error::Wallet(_))
        ));
    }
}
