//! Wrapping contexts applied to a core call before submission

use crate::descriptor::MultisigDescriptor;
use crate::identity::AccountId;
use parity_scale_codec::Encode;
use serde::{Deserialize, Serialize};

/// Permission class of a proxy delegation
///
/// Codec indices follow the relay chain runtimes; index 4 is retired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Encode)]
#[serde(rename_all = "snake_case")]
pub enum ProxyType {
    #[default]
    #[codec(index = 0)]
    Any,
    #[codec(index = 1)]
    NonTransfer,
    #[codec(index = 2)]
    Governance,
    #[codec(index = 3)]
    Staking,
    #[codec(index = 5)]
    IdentityJudgement,
    #[codec(index = 6)]
    CancelProxy,
    #[codec(index = 7)]
    Auction,
    #[codec(index = 8)]
    NominationPools,
}

/// One authorization layer around a call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WrapperContext {
    /// The inner call is dispatched by a multisig; `signer` approves it
    Multisig {
        descriptor: MultisigDescriptor,
        signer: AccountId,
    },
    /// The inner call is dispatched as `proxied`; `delegate` submits it
    Proxy {
        proxied: AccountId,
        delegate: AccountId,
        proxy_type: ProxyType,
    },
}

impl WrapperContext {
    /// Account that signs the call produced by this layer
    pub fn submitter(&self) -> &AccountId {
        match self {
            WrapperContext::Multisig { signer, .. } => signer,
            WrapperContext::Proxy { delegate, .. } => delegate,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WrapperContext::Multisig { .. } => "multisig",
            WrapperContext::Proxy { .. } => "proxy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CryptoFamily;

    #[test]
    fn test_submitter() {
        let a = AccountId::from([1u8; 32]);
        let b = AccountId::from([2u8; 32]);
        let multisig = WrapperContext::Multisig {
            descriptor: MultisigDescriptor::from_accounts(
                vec![a.clone(), b.clone()],
                2,
                CryptoFamily::Standard,
            ),
            signer: a.clone(),
        };
        assert_eq!(multisig.submitter(), &a);
        assert_eq!(multisig.kind(), "multisig");

        let proxy = WrapperContext::Proxy {
            proxied: a,
            delegate: b.clone(),
            proxy_type: ProxyType::Staking,
        };
        assert_eq!(proxy.submitter(), &b);
    }

    #[test]
    fn test_proxy_type_codec_index() {
        assert_eq!(ProxyType::Any.encode(), vec![0]);
        assert_eq!(ProxyType::Staking.encode(), vec![3]);
        assert_eq!(ProxyType::IdentityJudgement.encode(), vec![5]);
        assert_eq!(ProxyType::NominationPools.encode(), vec![8]);
    }

    #[test]
    fn test_wrapper_context_serde_tag() {
        let proxy = WrapperContext::Proxy {
            proxied: AccountId::from([1u8; 20]),
            delegate: AccountId::from([2u8; 20]),
            proxy_type: ProxyType::NonTransfer,
        };
        let json = serde_json::to_value(&proxy).unwrap();
        assert_eq!(json["type"], "proxy");
        assert_eq!(json["proxy_type"], "non_transfer");
    }
}
