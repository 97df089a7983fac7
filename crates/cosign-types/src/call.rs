//! Call data, hashes and envelopes

use crate::identity::{AccountId, IdentityError};
use parity_scale_codec::{Encode, Output};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of call and extrinsic hashes
pub const HASH_LEN: usize = 32;

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode)]
        pub struct $name([u8; HASH_LEN]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
                let s = s.trim();
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes =
                    hex::decode(raw).map_err(|e| IdentityError::InvalidHex(e.to_string()))?;
                let bytes: [u8; HASH_LEN] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = IdentityError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_newtype!(
    /// Hash of a core call; identifies a multisig operation on a chain
    CallHash
);

hash_newtype!(
    /// Hash of a broadcast extrinsic
    ExtrinsicHash
);

/// Opaque, chain-encoded call bytes
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct CallData(Vec<u8>);

impl CallData {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let s = s.trim();
        let raw = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(raw)
            .map(Self)
            .map_err(|e| IdentityError::InvalidHex(e.to_string()))
    }
}

/// A call nested inside another call is written verbatim
impl Encode for CallData {
    fn size_hint(&self) -> usize {
        self.0.len()
    }

    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        dest.write(&self.0);
    }
}

impl From<Vec<u8>> for CallData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for CallData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallData({})", self.to_hex())
    }
}

impl Serialize for CallData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CallData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Block height and extrinsic index at which a multisig operation was created
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode,
)]
pub struct Timepoint {
    pub height: u32,
    pub index: u32,
}

impl Timepoint {
    pub fn new(height: u32, index: u32) -> Self {
        Self { height, index }
    }
}

impl fmt::Display for Timepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.index)
    }
}

/// Location and hash of an included extrinsic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtrinsicRef {
    pub timepoint: Timepoint,
    pub hash: ExtrinsicHash,
}

impl ExtrinsicRef {
    pub fn new(timepoint: Timepoint, hash: ExtrinsicHash) -> Self {
        Self { timepoint, hash }
    }
}

/// The call to broadcast together with the core call it wraps
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Innermost, application-intended call
    pub core_call: CallData,
    /// Call to submit; equal to `core_call` when nothing wraps it
    pub wrapped_call: CallData,
    /// Hash of `core_call` only
    pub call_hash: CallHash,
    /// Account that signs `wrapped_call`, if any wrapper named one
    pub submitter: Option<AccountId>,
}

impl CallEnvelope {
    pub fn is_wrapped(&self) -> bool {
        self.core_call != self.wrapped_call
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_hash_hex() {
        let hash = CallHash::from_bytes([0x11; HASH_LEN]);
        assert_eq!(CallHash::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(matches!(
            CallHash::from_hex("0x1122"),
            Err(IdentityError::InvalidLength(2))
        ));
    }

    #[test]
    fn test_call_data_serde() {
        let call = CallData::new(vec![0x05, 0x00, 0xff]);
        let json = serde_json::to_string(&call).unwrap();
        assert_eq!(json, "\"0x0500ff\"");
        let back: CallData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn test_scale_layouts() {
        assert_eq!(Timepoint::new(7, 1).encode(), vec![7, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(CallHash::from_bytes([0xcc; HASH_LEN]).encode(), vec![0xcc; HASH_LEN]);
        assert_eq!(CallData::new(vec![5, 3]).encode(), vec![5, 3]);
        assert_eq!(Some(Timepoint::new(100, 2)).encode()[0], 1);
    }

    #[test]
    fn test_timepoint_display() {
        assert_eq!(Timepoint::new(1200, 3).to_string(), "1200-3");
    }
}
