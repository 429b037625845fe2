//! # Hashing Utilities
//!
//! The hash functions the wallet engine speaks. All of them are consensus
//! critical in one way or another, so none of them are configurable:
//!
//! - **SHA-256d** (`SHA256(SHA256(x))`) for transaction ids, block hashes,
//!   merkle nodes, referral hashes and signature hashes.
//! - **HASH160** (`RIPEMD160(SHA256(x))`) for addresses and key ids.
//! - **HMAC-SHA512** for BIP32 child key derivation.
//! - Plain **SHA-256** for copayer ids and encrypting-key derivation.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::config::{HASH160_LENGTH, HASH_LENGTH};

type HmacSha512 = Hmac<Sha512>;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use merit_wallet_core::crypto::sha256;
///
/// let hash = sha256(b"merit");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Every id in the binary codec is one of these.
pub fn double_sha256(data: &[u8]) -> [u8; HASH_LENGTH] {
    sha256(&sha256(data))
}

/// Hash two 32-byte nodes together: `SHA-256d(left || right)`.
///
/// Used by the merkle tree; avoids building a temporary 64-byte buffer
/// at every call site.
pub fn double_sha256_pair(left: &[u8; HASH_LENGTH], right: &[u8; HASH_LENGTH]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let first: [u8; HASH_LENGTH] = hasher.finalize().into();
    sha256(&first)
}

/// `RIPEMD160(SHA256(data))`, the 20-byte hash behind every address.
pub fn hash160(data: &[u8]) -> [u8; HASH160_LENGTH] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}

/// HMAC-SHA512 keyed with `key`. Returns the full 64-byte tag.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha512::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA512 accepts arbitrary key lengths"),
    };
    mac.update(data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 64];
    out.copy_from_slice(&tag);
    out
}

/// HMAC-SHA256 keyed with `key`. Used for password key-check values.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut mac = match Hmac::<Sha256>::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts arbitrary key lengths"),
    };
    mac.update(data);
    mac.finalize().into_bytes().into()
}
