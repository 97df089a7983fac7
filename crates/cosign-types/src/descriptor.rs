//! Multisig descriptors

use crate::identity::{AccountId, MemberIdentity, ETHEREUM_ACCOUNT_LEN, STANDARD_ACCOUNT_LEN};
use cosign_errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Account scheme of the chain the multisig lives on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoFamily {
    #[default]
    Standard,
    EthereumStyle,
}

impl CryptoFamily {
    /// Length of account ids in this family
    pub fn account_len(&self) -> usize {
        match self {
            CryptoFamily::Standard => STANDARD_ACCOUNT_LEN,
            CryptoFamily::EthereumStyle => ETHEREUM_ACCOUNT_LEN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoFamily::Standard => "standard",
            CryptoFamily::EthereumStyle => "ethereum_style",
        }
    }
}

/// Members, threshold and account scheme of a multisig
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigDescriptor {
    pub members: Vec<MemberIdentity>,
    pub threshold: u16,
    #[serde(default)]
    pub crypto_family: CryptoFamily,
}

impl MultisigDescriptor {
    pub fn new(
        members: impl IntoIterator<Item = MemberIdentity>,
        threshold: u16,
        crypto_family: CryptoFamily,
    ) -> Self {
        Self {
            members: members.into_iter().collect(),
            threshold,
            crypto_family,
        }
    }

    /// Build from bare account ids
    pub fn from_accounts(
        accounts: impl IntoIterator<Item = AccountId>,
        threshold: u16,
        crypto_family: CryptoFamily,
    ) -> Self {
        Self::new(
            accounts.into_iter().map(MemberIdentity::new),
            threshold,
            crypto_family,
        )
    }

    /// Member account ids, de-duplicated and sorted by byte order
    pub fn canonical_members(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> =
            self.members.iter().map(|m| m.account.clone()).collect();
        accounts.sort();
        accounts.dedup();
        accounts
    }

    /// Check member set and threshold bounds
    pub fn validate(&self) -> Result<()> {
        let members = self.canonical_members();
        if members.is_empty() {
            return Err(Error::EmptyMemberSet);
        }
        if self.threshold < 2 || usize::from(self.threshold) > members.len() {
            return Err(Error::InvalidThreshold {
                threshold: self.threshold,
                members: members.len(),
            });
        }
        Ok(())
    }

    pub fn is_member(&self, account: &AccountId) -> bool {
        self.members.iter().any(|m| &m.account == account)
    }

    /// Look up a member's identity, including its display name
    pub fn member(&self, account: &AccountId) -> Option<&MemberIdentity> {
        self.members.iter().find(|m| &m.account == account)
    }

    /// All members except `signer`, sorted and de-duplicated
    pub fn other_signatories(&self, signer: &AccountId) -> Result<Vec<AccountId>> {
        if !self.is_member(signer) {
            return Err(Error::NotASignatory(signer.to_hex()));
        }
        Ok(self
            .canonical_members()
            .into_iter()
            .filter(|account| account != signer)
            .collect())
    }

    /// Same member set, threshold and family, ignoring order and names
    pub fn is_equivalent(&self, other: &MultisigDescriptor) -> bool {
        self.threshold == other.threshold
            && self.crypto_family == other.crypto_family
            && self.canonical_members() == other.canonical_members()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId {
        AccountId::from([byte; 32])
    }

    #[test]
    fn test_canonical_members_sorted_and_deduped() {
        let descriptor = MultisigDescriptor::from_accounts(
            vec![account(3), account(1), account(2), account(1)],
            2,
            CryptoFamily::Standard,
        );
        assert_eq!(
            descriptor.canonical_members(),
            vec![account(1), account(2), account(3)]
        );
    }

    #[test]
    fn test_validate_bounds() {
        let members = vec![account(1), account(2), account(3)];
        for threshold in [0u16, 1, 4] {
            let d = MultisigDescriptor::from_accounts(
                members.clone(),
                threshold,
                CryptoFamily::Standard,
            );
            assert!(matches!(d.validate(), Err(Error::InvalidThreshold { .. })));
        }
        for threshold in [2u16, 3] {
            let d = MultisigDescriptor::from_accounts(
                members.clone(),
                threshold,
                CryptoFamily::Standard,
            );
            assert!(d.validate().is_ok());
        }

        let empty = MultisigDescriptor::from_accounts(vec![], 2, CryptoFamily::Standard);
        assert_eq!(empty.validate(), Err(Error::EmptyMemberSet));
    }

    #[test]
    fn test_duplicates_do_not_satisfy_threshold() {
        let d = MultisigDescriptor::from_accounts(
            vec![account(1), account(1)],
            2,
            CryptoFamily::Standard,
        );
        assert_eq!(
            d.validate(),
            Err(Error::InvalidThreshold {
                threshold: 2,
                members: 1
            })
        );
    }

    #[test]
    fn test_other_signatories() {
        let d = MultisigDescriptor::from_accounts(
            vec![account(3), account(1), account(2)],
            2,
            CryptoFamily::Standard,
        );
        assert_eq!(
            d.other_signatories(&account(2)).unwrap(),
            vec![account(1), account(3)]
        );
        assert!(matches!(
            d.other_signatories(&account(9)),
            Err(Error::NotASignatory(_))
        ));
    }

    #[test]
    fn test_is_equivalent_ignores_order_and_names() {
        let a = MultisigDescriptor::new(
            vec![
                MemberIdentity::with_name(account(1), "alice"),
                MemberIdentity::new(account(2)),
            ],
            2,
            CryptoFamily::Standard,
        );
        let b = MultisigDescriptor::from_accounts(
            vec![account(2), account(1)],
            2,
            CryptoFamily::Standard,
        );
        assert!(a.is_equivalent(&b));
        assert_ne!(a, b);
    }
}
