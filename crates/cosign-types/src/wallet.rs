//! Wallet records exchanged with the wallet registry

use crate::descriptor::MultisigDescriptor;
use crate::identity::AccountId;
use crate::operation::ChainId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    SingleOwner,
    Multisig,
    Proxied,
    WatchOnly,
}

/// An account held by a wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub account_id: AccountId,
    pub name: String,
    /// Chain the account is bound to; `None` for chain-agnostic accounts
    #[serde(default)]
    pub chain_id: Option<ChainId>,
    #[serde(default)]
    pub multisig: Option<MultisigDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: u64,
    pub name: String,
    pub kind: WalletKind,
    pub accounts: Vec<WalletAccount>,
}

impl Wallet {
    pub fn holds_account(&self, account_id: &AccountId) -> bool {
        self.accounts.iter().any(|a| &a.account_id == account_id)
    }
}

/// A wallet ready to be created by the registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDraft {
    pub name: String,
    pub kind: WalletKind,
    pub accounts: Vec<WalletAccount>,
}

impl WalletDraft {
    /// Draft of a multisig wallet holding exactly one derived account
    pub fn multisig(
        name: impl Into<String>,
        account_id: AccountId,
        chain_id: Option<ChainId>,
        descriptor: MultisigDescriptor,
    ) -> Self {
        let name = name.into();
        Self {
            name: name.clone(),
            kind: WalletKind::Multisig,
            accounts: vec![WalletAccount {
                account_id,
                name,
                chain_id,
                multisig: Some(descriptor),
            }],
        }
    }

    pub fn into_wallet(self, id: u64) -> Wallet {
        Wallet {
            id,
            name: self.name,
            kind: self.kind,
            accounts: self.accounts,
        }
    }
}
