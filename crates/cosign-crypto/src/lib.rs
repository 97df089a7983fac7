//! Cryptographic primitives for cosign
//!
//! Multisig identity derivation and call hashing. Signing is delegated to an
//! external signer and is not implemented here.

pub mod derive;
pub mod hash;

pub use derive::{derive_account_identity, MULTISIG_DOMAIN};
pub use hash::{blake2_256, call_hash};
