//! Merkle root over transaction ids.

use crate::hash::double_sha256;

/// Merkle root of `txids`, duplicating the last node of odd levels.
///
/// A single transaction's root is its own txid; an empty list gives zero.
pub fn compute_merkle_root(txids: &[[u8; 32]]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = txids.to_vec();
    if level.is_empty() {
        return [0u8; 32];
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut combined = [0u8; 64];
                combined[..32].copy_from_slice(&left);
                combined[32..].copy_from_slice(&right);
                double_sha256(&combined)
            })
            .collect();
    }

    level[0]
}
