//! Block-building helpers for tests.
//!
//! Blocks built here pass [`check_block_sanity`](crate::validation::check_block_sanity):
//! a unique coinbase per `(parent, tag)` and a correct merkle root.

use tarn_core::merkle;
use tarn_core::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput};

/// A coinbase whose script commits to `parent` and `tag`.
pub fn coinbase_tx(parent: &Hash256, tag: u64) -> Transaction {
    let mut script = parent.as_bytes().to_vec();
    script.extend_from_slice(&tag.to_le_bytes());
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            script,
        }],
        outputs: vec![TxOutput {
            value: 50,
            pubkey_hash: Hash256([0x42; 32]),
        }],
        lock_time: 0,
    }
}

/// A non-coinbase transaction spending a made-up outpoint.
pub fn spend_tx(seed: u8) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint {
                txid: Hash256([seed; 32]),
                index: 0,
            },
            script: vec![seed],
        }],
        outputs: vec![TxOutput {
            value: 1,
            pubkey_hash: Hash256([seed; 32]),
        }],
        lock_time: 0,
    }
}

/// A valid block on top of `parent`. Different `tag`s give different hashes.
pub fn child_block(parent: &Block, tag: u64) -> Block {
    block_on(parent.hash(), parent.header.timestamp + 60, tag)
}

/// A valid block whose parent is `prev_hash`, which need not exist anywhere.
pub fn block_on(prev_hash: Hash256, timestamp: u64, tag: u64) -> Block {
    let transactions = vec![coinbase_tx(&prev_hash, tag)];
    let merkle_root = merkle::transactions_root(&transactions).expect("test transactions encode");
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash,
            merkle_root,
            timestamp,
            difficulty_target: u64::MAX,
            nonce: tag,
        },
        transactions,
    }
}

/// `len` blocks extending `parent`, in connection order.
pub fn build_chain(parent: &Block, len: usize, tag: u64) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::with_capacity(len);
    for _ in 0..len {
        let next = child_block(blocks.last().unwrap_or(parent), tag);
        blocks.push(next);
    }
    blocks
}
