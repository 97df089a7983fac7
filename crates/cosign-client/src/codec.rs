//! Call composition for multisig and proxy layers
//!
//! The engine treats call bytes as opaque. A `CallComposer` knows how a given
//! chain lays out the wrapping calls; `ScaleCallComposer` is the layout used by
//! Substrate runtimes, with pallet and call indices taken from configuration.

use cosign_errors::{Error, Result};
use cosign_types::{
    AccountId, CallData, CallHash, ChainConfig, CryptoFamily, ProxyType, Timepoint,
};
use parity_scale_codec::Encode;

/// Builds the wrapping calls of one chain
pub trait CallComposer: Send + Sync {
    /// `multisig.as_multi { threshold, other_signatories, maybe_timepoint, call }`
    fn as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId],
        maybe_timepoint: Option<Timepoint>,
        call: &CallData,
    ) -> Result<CallData>;

    /// `multisig.cancel_as_multi { threshold, other_signatories, timepoint, call_hash }`
    fn cancel_as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId],
        timepoint: Timepoint,
        call_hash: &CallHash,
    ) -> Result<CallData>;

    /// `proxy.proxy { real, force_proxy_type, call }`
    fn proxy(
        &self,
        real: &AccountId,
        force_proxy_type: Option<ProxyType>,
        call: &CallData,
    ) -> Result<CallData>;
}

/// Reference weight limit attached to `as_multi`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode)]
pub struct Weight {
    #[codec(compact)]
    pub ref_time: u64,
    #[codec(compact)]
    pub proof_size: u64,
}

#[derive(Encode)]
struct AsMulti<'a> {
    threshold: u16,
    other_signatories: &'a [AccountId],
    maybe_timepoint: Option<Timepoint>,
    call: &'a CallData,
    max_weight: Weight,
}

#[derive(Encode)]
struct CancelAsMulti<'a> {
    threshold: u16,
    other_signatories: &'a [AccountId],
    timepoint: Timepoint,
    call_hash: &'a CallHash,
}

#[derive(Encode)]
struct Proxy<'a, A> {
    real: A,
    force_proxy_type: Option<ProxyType>,
    call: &'a CallData,
}

/// Address form of standard chains
#[derive(Encode)]
enum MultiAddress<'a> {
    #[codec(index = 0)]
    Id(&'a AccountId),
}

/// SCALE layout `[pallet_index, call_index, args..]`
#[derive(Clone, Debug)]
pub struct ScaleCallComposer {
    crypto_family: CryptoFamily,
    multisig_pallet: u8,
    as_multi_call: u8,
    cancel_as_multi_call: u8,
    proxy_pallet: u8,
    proxy_call: u8,
    max_weight: Weight,
}

impl ScaleCallComposer {
    pub fn from_chain(chain: &ChainConfig) -> Self {
        Self {
            crypto_family: chain.crypto_family,
            multisig_pallet: chain.multisig_pallet,
            as_multi_call: chain.as_multi_call,
            cancel_as_multi_call: chain.cancel_as_multi_call,
            proxy_pallet: chain.proxy_pallet,
            proxy_call: chain.proxy_call,
            max_weight: Weight {
                ref_time: chain.max_weight_ref_time,
                proof_size: chain.max_weight_proof_size,
            },
        }
    }

    pub fn with_max_weight(mut self, max_weight: Weight) -> Self {
        self.max_weight = max_weight;
        self
    }

    fn check_account(&self, account: &AccountId) -> Result<()> {
        let expected = self.crypto_family.account_len();
        if account.len() != expected {
            return Err(Error::UnresolvedWrapperContext(format!(
                "account {account} has {} bytes, chain expects {expected}",
                account.len()
            )));
        }
        Ok(())
    }

    fn check_signatories(&self, signatories: &[AccountId]) -> Result<()> {
        signatories
            .iter()
            .try_for_each(|account| self.check_account(account))
    }
}

fn compose(pallet: u8, call: u8, args: impl Encode) -> CallData {
    CallData::new((pallet, call, args).encode())
}

impl CallComposer for ScaleCallComposer {
    fn as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId],
        maybe_timepoint: Option<Timepoint>,
        call: &CallData,
    ) -> Result<CallData> {
        self.check_signatories(other_signatories)?;
        let args = AsMulti {
            threshold,
            other_signatories,
            maybe_timepoint,
            call,
            max_weight: self.max_weight,
        };
        Ok(compose(self.multisig_pallet, self.as_multi_call, args))
    }

    fn cancel_as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId],
        timepoint: Timepoint,
        call_hash: &CallHash,
    ) -> Result<CallData> {
        self.check_signatories(other_signatories)?;
        let args = CancelAsMulti {
            threshold,
            other_signatories,
            timepoint,
            call_hash,
        };
        Ok(compose(self.multisig_pallet, self.cancel_as_multi_call, args))
    }

    /// `MultiAddress::Id` on standard chains, the raw account on Ethereum-style ones
    fn proxy(
        &self,
        real: &AccountId,
        force_proxy_type: Option<ProxyType>,
        call: &CallData,
    ) -> Result<CallData> {
        self.check_account(real)?;
        let composed = match self.crypto_family {
            CryptoFamily::Standard => {
                let args = Proxy {
                    real: MultiAddress::Id(real),
                    force_proxy_type,
                    call,
                };
                compose(self.proxy_pallet, self.proxy_call, args)
            }
            CryptoFamily::EthereumStyle => {
                let args = Proxy {
                    real,
                    force_proxy_type,
                    call,
                };
                compose(self.proxy_pallet, self.proxy_call, args)
            }
        };
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_types::Config;

    fn polkadot() -> ScaleCallComposer {
        ScaleCallComposer::from_chain(&Config::default().chains[0]).with_max_weight(Weight {
            ref_time: 1,
            proof_size: 2,
        })
    }

    #[test]
    fn test_as_multi_layout() {
        let others = vec![AccountId::from([2u8; 32]), AccountId::from([3u8; 32])];
        let call = CallData::new(vec![0x05, 0x03]);
        let wrapped = polkadot()
            .as_multi(2, &others, Some(Timepoint::new(7, 1)), &call)
            .unwrap();
        let bytes = wrapped.as_bytes();

        assert_eq!(&bytes[..2], &[30, 1]);
        assert_eq!(&bytes[2..4], &[2, 0]);
        assert_eq!(bytes[4], 2 << 2);
        assert_eq!(&bytes[5..37], &[2u8; 32]);
        assert_eq!(&bytes[37..69], &[3u8; 32]);
        assert_eq!(&bytes[69..78], &[1, 7, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(&bytes[78..80], &[0x05, 0x03]);
        assert_eq!(&bytes[80..], &[1 << 2, 2 << 2]);
    }

    #[test]
    fn test_max_weight_is_compact() {
        let weight = Weight {
            ref_time: 10_000_000_000,
            proof_size: 64,
        };
        assert_eq!(
            weight.encode(),
            vec![0x07, 0x00, 0xe4, 0x0b, 0x54, 0x02, 0x01, 0x01]
        );
    }

    #[test]
    fn test_as_multi_without_timepoint() {
        let others = vec![AccountId::from([2u8; 32])];
        let call = CallData::new(vec![0xaa]);
        let wrapped = polkadot().as_multi(2, &others, None, &call).unwrap();
        assert_eq!(wrapped.as_bytes()[37], 0);
        assert_eq!(wrapped.as_bytes()[38], 0xaa);
    }

    #[test]
    fn test_cancel_as_multi_layout() {
        let others = vec![AccountId::from([2u8; 32])];
        let hash = CallHash::from_bytes([0xcc; 32]);
        let cancel = polkadot()
            .cancel_as_multi(2, &others, Timepoint::new(9, 4), &hash)
            .unwrap();
        let bytes = cancel.as_bytes();
        assert_eq!(&bytes[..2], &[30, 3]);
        assert_eq!(&bytes[37..45], &[9, 0, 0, 0, 4, 0, 0, 0]);
        assert_eq!(&bytes[45..], &[0xcc; 32]);
    }

    #[test]
    fn test_proxy_layout() {
        let real = AccountId::from([4u8; 32]);
        let call = CallData::new(vec![0x01]);
        let wrapped = polkadot()
            .proxy(&real, Some(ProxyType::Staking), &call)
            .unwrap();
        let bytes = wrapped.as_bytes();
        assert_eq!(&bytes[..3], &[29, 0, 0]);
        assert_eq!(&bytes[3..35], &[4u8; 32]);
        assert_eq!(&bytes[35..], &[1, 3, 0x01]);
    }

    #[test]
    fn test_ethereum_style_addresses_are_raw() {
        let mut chain = Config::default().chains[0].clone();
        chain.crypto_family = CryptoFamily::EthereumStyle;
        let composer = ScaleCallComposer::from_chain(&chain);

        let wrapped = composer
            .proxy(&AccountId::from([4u8; 20]), None, &CallData::new(vec![0x01]))
            .unwrap();
        let mut expected = vec![29u8, 0];
        expected.extend_from_slice(&[4u8; 20]);
        expected.extend_from_slice(&[0, 0x01]);
        assert_eq!(wrapped.as_bytes(), expected.as_slice());

        assert!(matches!(
            composer.proxy(&AccountId::from([4u8; 32]), None, &CallData::new(vec![])),
            Err(Error::UnresolvedWrapperContext(_))
        ));
    }
}
