//! Multisig account identity derivation
//!
//! The identity is `blake2_256("modlpy/utilisuba" ++ compact(n) ++ members ++ threshold_le)`
//! over the members sorted by byte order, which matches the multisig pallet's
//! `multi_account_id`. Ethereum-style chains keep the first 20 bytes.

use crate::hash::blake2_256;
use cosign_errors::Result;
use cosign_types::identity::ETHEREUM_ACCOUNT_LEN;
use cosign_types::{AccountId, CryptoFamily, MultisigDescriptor};
use parity_scale_codec::Encode;
use tracing::trace;

/// Domain separator of the multisig pallet
pub const MULTISIG_DOMAIN: &[u8; 16] = b"modlpy/utilisuba";

/// Derive the account identity of a multisig
///
/// Fails with `EmptyMemberSet` or `InvalidThreshold`; the result does not
/// depend on member order, duplicates or display names.
pub fn derive_account_identity(descriptor: &MultisigDescriptor) -> Result<AccountId> {
    descriptor.validate()?;

    let members = descriptor.canonical_members();
    let full = (MULTISIG_DOMAIN, &members, descriptor.threshold).using_encoded(blake2_256);
    let identity = match descriptor.crypto_family {
        CryptoFamily::Standard => AccountId::from(full),
        CryptoFamily::EthereumStyle => {
            let mut truncated = [0u8; ETHEREUM_ACCOUNT_LEN];
            truncated.copy_from_slice(&full[..ETHEREUM_ACCOUNT_LEN]);
            AccountId::from(truncated)
        }
    };

    trace!(
        members = members.len(),
        threshold = descriptor.threshold,
        identity = %identity,
        "derived multisig identity"
    );
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_errors::Error;
    use cosign_types::MemberIdentity;
    use proptest::prelude::*;

    fn account(byte: u8) -> AccountId {
        AccountId::from([byte; 32])
    }

    fn descriptor(members: Vec<AccountId>, threshold: u16) -> MultisigDescriptor {
        MultisigDescriptor::from_accounts(members, threshold, CryptoFamily::Standard)
    }

    #[test]
    fn test_known_vector() {
        let id = derive_account_identity(&descriptor(
            vec![account(1), account(2), account(3)],
            2,
        ))
        .unwrap();
        assert_eq!(
            id.to_hex(),
            "0x3ffd20eb97bafd6f5af8d026cd11101f1553fa9cb4b8a37d1721314fbbb48fc5"
        );
    }

    #[test]
    fn test_order_independence() {
        let abc = derive_account_identity(&descriptor(
            vec![account(1), account(2), account(3)],
            2,
        ))
        .unwrap();
        let cab = derive_account_identity(&descriptor(
            vec![account(3), account(1), account(2)],
            2,
        ))
        .unwrap();
        assert_eq!(abc, cab);
    }

    #[test]
    fn test_threshold_changes_identity() {
        let members = vec![account(1), account(2), account(3)];
        let two = derive_account_identity(&descriptor(members.clone(), 2)).unwrap();
        let three = derive_account_identity(&descriptor(members, 3)).unwrap();
        assert_ne!(two, three);
    }

    #[test]
    fn test_threshold_bounds() {
        let members = vec![account(1), account(2), account(3)];
        for threshold in [0u16, 1, 4, u16::MAX] {
            assert!(matches!(
                derive_account_identity(&descriptor(members.clone(), threshold)),
                Err(Error::InvalidThreshold { .. })
            ));
        }
        for threshold in 2u16..=3 {
            assert!(derive_account_identity(&descriptor(members.clone(), threshold)).is_ok());
        }
        assert_eq!(
            derive_account_identity(&descriptor(vec![], 2)),
            Err(Error::EmptyMemberSet)
        );
    }

    #[test]
    fn test_ethereum_style_truncates() {
        let members = vec![
            AccountId::from([1u8; 20]),
            AccountId::from([2u8; 20]),
            AccountId::from([3u8; 20]),
        ];
        let standard = derive_account_identity(&MultisigDescriptor::from_accounts(
            members.clone(),
            2,
            CryptoFamily::Standard,
        ))
        .unwrap();
        let eth = derive_account_identity(&MultisigDescriptor::from_accounts(
            members,
            2,
            CryptoFamily::EthereumStyle,
        ))
        .unwrap();
        assert_eq!(standard.len(), 32);
        assert_eq!(eth.len(), 20);
        assert_eq!(eth.as_bytes(), &standard.as_bytes()[..20]);
    }

    #[test]
    fn test_names_and_duplicates_ignored() {
        let named = MultisigDescriptor::new(
            vec![
                MemberIdentity::with_name(account(2), "bob"),
                MemberIdentity::with_name(account(1), "alice"),
                MemberIdentity::new(account(1)),
            ],
            2,
            CryptoFamily::Standard,
        );
        let bare = descriptor(vec![account(1), account(2)], 2);
        assert_eq!(
            derive_account_identity(&named).unwrap(),
            derive_account_identity(&bare).unwrap()
        );
    }

    proptest! {
        #[test]
        fn prop_permutation_invariant(
            seeds in proptest::collection::btree_set(any::<[u8; 32]>(), 2..8),
            shift in 0usize..8,
            threshold_offset in 0u16..6,
        ) {
            let members: Vec<AccountId> = seeds.into_iter().map(AccountId::from).collect();
            let threshold = 2 + threshold_offset % (members.len() as u16 - 1);

            let mut rotated = members.clone();
            rotated.rotate_left(shift % members.len());
            let mut reversed = members.clone();
            reversed.reverse();

            let base = derive_account_identity(&descriptor(members, threshold)).unwrap();
            prop_assert_eq!(&base, &derive_account_identity(&descriptor(rotated, threshold)).unwrap());
            prop_assert_eq!(&base, &derive_account_identity(&descriptor(reversed, threshold)).unwrap());
        }
    }
}
