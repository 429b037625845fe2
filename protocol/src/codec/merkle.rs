//! Merkle root over transaction ids.
//!
//! Adjacent hashes are paired with `SHA-256d(left || right)`. A level with
//! an odd count duplicates its last element. Zero leaves give the null
//! hash; one leaf is its own root.

use super::Hash256;
use crate::crypto::hash::double_sha256_pair;

pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }

    let mut level: Vec<[u8; 32]> = leaves.iter().map(|h| h.to_bytes()).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks_exact(2)
            .map(|pair| double_sha256_pair(&pair[0], &pair[1]))
            .collect();
    }

    Hash256::from_bytes(level[0])
}
