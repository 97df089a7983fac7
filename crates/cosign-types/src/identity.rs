//! Account identities

use parity_scale_codec::{Encode, Output};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a standard (sr25519/ed25519 style) account id
pub const STANDARD_ACCOUNT_LEN: usize = 32;

/// Length of an Ethereum-style account id
pub const ETHEREUM_ACCOUNT_LEN: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid account id length: {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// Opaque fixed-length account identity
///
/// Ordering is unsigned byte-lexicographic, which is the canonical member
/// order used for multisig derivation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(Vec<u8>);

impl AccountId {
    /// Create from raw bytes; only 20 and 32 byte identities are accepted
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        match bytes.len() {
            STANDARD_ACCOUNT_LEN | ETHEREUM_ACCOUNT_LEN => Ok(Self(bytes.to_vec())),
            len => Err(IdentityError::InvalidLength(len)),
        }
    }

    /// Parse from a hex string, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let s = s.trim();
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| IdentityError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl From<[u8; STANDARD_ACCOUNT_LEN]> for AccountId {
    fn from(bytes: [u8; STANDARD_ACCOUNT_LEN]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<[u8; ETHEREUM_ACCOUNT_LEN]> for AccountId {
    fn from(bytes: [u8; ETHEREUM_ACCOUNT_LEN]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

/// Raw bytes without a length prefix, like the runtime's fixed-size account types
impl Encode for AccountId {
    fn size_hint(&self) -> usize {
        self.0.len()
    }

    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        dest.write(&self.0);
    }
}

impl FromStr for AccountId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A multisig member: account identity plus an optional display name
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub account: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MemberIdentity {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            name: None,
        }
    }

    pub fn with_name(account: AccountId, name: impl Into<String>) -> Self {
        Self {
            account,
            name: Some(name.into()),
        }
    }
}

impl From<AccountId> for MemberIdentity {
    fn from(account: AccountId) -> Self {
        Self::new(account)
    }
}
