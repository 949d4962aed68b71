//! Blake2b hashing and object-id derivation.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use quorum_types::{Address, ObjectId};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Derive the id of the `index`-th object created by transaction `tx_seq`.
///
/// `domain` separates id spaces so that unrelated callers hashing the same
/// sender and sequence never collide.
pub fn derive_object_id(domain: &[u8], sender: &Address, tx_seq: u64, index: u64) -> ObjectId {
    ObjectId::new(blake2b_256_multi(&[
        domain,
        sender.as_bytes(),
        &tx_seq.to_le_bytes(),
        &index.to_le_bytes(),
    ]))
}
