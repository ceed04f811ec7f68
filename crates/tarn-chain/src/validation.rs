//! Context-free block checks.
//!
//! Run before a block is indexed or pooled, so a malformed block is never
//! reported as an orphan and never reaches the store.

use std::collections::HashSet;

use tarn_core::constants::MAX_BLOCK_SIZE;
use tarn_core::error::BlockError;
use tarn_core::merkle;
use tarn_core::types::Block;

/// Validate block structure.
///
/// Checks:
/// - At least one transaction (the coinbase)
/// - First transaction is coinbase, no others are
/// - No duplicate transaction IDs
/// - Merkle root in header matches computed root
/// - Serialized size is within [`MAX_BLOCK_SIZE`]
pub fn check_block_sanity(block: &Block) -> Result<(), BlockError> {
    let first = block.coinbase().ok_or(BlockError::NoTransactions)?;
    if !first.is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }
    if block.transactions[1..].iter().any(|tx| tx.is_coinbase()) {
        return Err(BlockError::MultipleCoinbase);
    }

    let mut seen = HashSet::with_capacity(block.transactions.len());
    for tx in &block.transactions {
        let txid = tx.txid()?;
        if !seen.insert(txid) {
            return Err(BlockError::DuplicateTransaction(txid.to_string()));
        }
    }

    if merkle::transactions_root(&block.transactions)? != block.header.merkle_root {
        return Err(BlockError::InvalidMerkleRoot);
    }

    let size = block.serialized_size()?;
    if size > MAX_BLOCK_SIZE {
        return Err(BlockError::OversizedBlock {
            size,
            max: MAX_BLOCK_SIZE,
        });
    }
    Ok(())
}
