//! BLAKE3 Merkle root over transaction IDs.
//!
//! Leaf hash: `BLAKE3(0x00 || txid)`, internal node: `BLAKE3(0x01 || left || right)`.
//! Odd-length layers duplicate their last element. An empty list yields
//! [`Hash256::ZERO`].

use crate::error::BlockError;
use crate::types::{Hash256, Transaction};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

fn leaf_hash(data: &Hash256) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[LEAF_PREFIX]);
    hasher.update(data.as_bytes());
    Hash256(hasher.finalize().into())
}

fn node_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash256(hasher.finalize().into())
}

/// Compute the Merkle root from a slice of leaf values.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }

    let mut current: Vec<Hash256> = leaves.iter().map(leaf_hash).collect();
    while current.len() > 1 {
        current = current
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => node_hash(left, right),
                [single] => node_hash(single, single),
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }
    current[0]
}

/// Merkle root of a block's transactions.
pub fn transactions_root(txs: &[Transaction]) -> Result<Hash256, BlockError> {
    let txids = txs
        .iter()
        .map(Transaction::txid)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merkle_root(&txids))
}
