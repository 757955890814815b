//! Hashers used for storage keys and extrinsic hashes.

use blake2::digest::consts::{U16, U32};
use blake2::{Blake2b, Digest};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// 128-bit BLAKE2b.
pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Blake2b::<U16>::digest(data));
    out
}

/// 256-bit BLAKE2b.
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b::<U32>::digest(data));
    out
}

/// Two concatenated xxHash64 rounds with seeds 0 and 1.
pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (seed, chunk) in out.chunks_exact_mut(8).enumerate() {
        let mut hasher = XxHash64::with_seed(seed as u64);
        hasher.write(data);
        chunk.copy_from_slice(&hasher.finish().to_le_bytes());
    }
    out
}

/// Single xxHash64 round.
pub fn twox_64(data: &[u8]) -> [u8; 8] {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish().to_le_bytes()
}

/// Key hashers of storage maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageHasher {
    Blake2_128Concat,
    Twox64Concat,
    Identity,
}

impl StorageHasher {
    /// Append the hashed form of `key` to `out`.
    pub fn hash_into(&self, key: &[u8], out: &mut Vec<u8>) {
        match self {
            StorageHasher::Blake2_128Concat => {
                out.extend_from_slice(&blake2_128(key));
                out.extend_from_slice(key);
            }
            StorageHasher::Twox64Concat => {
                out.extend_from_slice(&twox_64(key));
                out.extend_from_slice(key);
            }
            StorageHasher::Identity => out.extend_from_slice(key),
        }
    }
}

/// `twox_128(pallet) ‖ twox_128(item)`.
pub fn storage_prefix(pallet: &str, item: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&twox_128(pallet.as_bytes()));
    key.extend_from_slice(&twox_128(item.as_bytes()));
    key
}

/// Full key of a map entry: prefix followed by each hashed key part.
pub fn storage_key(pallet: &str, item: &str, parts: &[(StorageHasher, &[u8])]) -> Vec<u8> {
    let mut key = storage_prefix(pallet, item);
    for (hasher, part) in parts {
        hasher.hash_into(part, &mut key);
    }
    key
}
