//! BLAKE2b-256 hashing for calls

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use cosign_types::{CallData, CallHash};

type Blake2b256 = Blake2b<U32>;

/// BLAKE2b with a 256-bit output
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash identifying a multisig operation; depends on the call bytes only
pub fn call_hash(call: &CallData) -> CallHash {
    CallHash::from_bytes(blake2_256(call.as_bytes()))
}
