//! In-memory [`BlockStore`] for tests and ephemeral nodes.
//!
//! Everything lives in `HashMap`s behind one `RwLock`; nothing survives a
//! restart. The production node uses RocksDB (tarn-node).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{ChainError, TarnError};
use crate::traits::BlockStore;
use crate::types::{Block, Hash256};

#[derive(Default)]
struct Inner {
    /// Every block ever connected, by hash. Disconnect keeps the body.
    blocks: HashMap<Hash256, Block>,
    /// Main chain: index is height.
    main_chain: Vec<Hash256>,
    /// Main-chain hash → height.
    heights: HashMap<Hash256, u64>,
}

/// In-memory block store.
#[derive(Default)]
pub struct MemoryBlockStore {
    inner: RwLock<Inner>,
    syncs: AtomicU64,
}

impl MemoryBlockStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times [`BlockStore::sync`] has been called.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }
}

impl BlockStore for MemoryBlockStore {
    fn chain_tip(&self) -> Result<(u64, Hash256), TarnError> {
        let inner = self.inner.read();
        match inner.main_chain.last() {
            Some(hash) => Ok(((inner.main_chain.len() - 1) as u64, *hash)),
            None => Ok((0, Hash256::ZERO)),
        }
    }

    fn connect_block(&self, block: &Block, height: u64) -> Result<(), TarnError> {
        let mut inner = self.inner.write();
        let expected = inner.main_chain.len() as u64;
        if height != expected {
            return Err(ChainError::HeightMismatch {
                expected,
                got: height,
            }
            .into());
        }
        let hash = block.hash();
        inner.blocks.insert(hash, block.clone());
        inner.main_chain.push(hash);
        inner.heights.insert(hash, height);
        Ok(())
    }

    fn disconnect_tip(&self) -> Result<Hash256, TarnError> {
        let mut inner = self.inner.write();
        let hash = inner.main_chain.pop().ok_or(ChainError::EmptyChain)?;
        inner.heights.remove(&hash);
        Ok(hash)
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, TarnError> {
        Ok(self.inner.read().blocks.get(hash).cloned())
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, TarnError> {
        Ok(self.inner.read().main_chain.get(height as usize).copied())
    }

    fn get_height(&self, hash: &Hash256) -> Result<Option<u64>, TarnError> {
        Ok(self.inner.read().heights.get(hash).copied())
    }

    fn sync(&self) -> Result<(), TarnError> {
        self.syncs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NetworkType;
    use crate::genesis;
    use crate::types::BlockHeader;

    fn child_of(parent: &Block, nonce: u64) -> Block {
        Block {
            header: BlockHeader {
                prev_hash: parent.hash(),
                nonce,
                ..parent.header.clone()
            },
            transactions: parent.transactions.clone(),
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = MemoryBlockStore::new();
        assert!(store.is_empty());
        assert_eq!(store.chain_tip().unwrap(), (0, Hash256::ZERO));
    }

    #[test]
    fn connect_advances_tip() {
        let store = MemoryBlockStore::new();
        let g = genesis::genesis_block(NetworkType::Regtest).clone();
        store.connect_block(&g, 0).unwrap();
        let b1 = child_of(&g, 1);
        store.connect_block(&b1, 1).unwrap();

        assert_eq!(store.chain_tip().unwrap(), (1, b1.hash()));
        assert_eq!(store.get_height(&g.hash()).unwrap(), Some(0));
        assert_eq!(store.get_block_hash(1).unwrap(), Some(b1.hash()));
    }

    #[test]
    fn connect_rejects_wrong_height() {
        let store = MemoryBlockStore::new();
        let g = genesis::genesis_block(NetworkType::Regtest).clone();
        let err = store.connect_block(&g, 3).unwrap_err();
        assert!(matches!(
            err,
            TarnError::Chain(ChainError::HeightMismatch { expected: 0, got: 3 })
        ));
    }

    #[test]
    fn disconnect_keeps_block_body() {
        let store = MemoryBlockStore::new();
        let g = genesis::genesis_block(NetworkType::Regtest).clone();
        store.connect_block(&g, 0).unwrap();
        let b1 = child_of(&g, 1);
        store.connect_block(&b1, 1).unwrap();

        assert_eq!(store.disconnect_tip().unwrap(), b1.hash());
        assert_eq!(store.chain_tip().unwrap(), (0, g.hash()));
        assert_eq!(store.get_height(&b1.hash()).unwrap(), None);
        assert!(store.get_block(&b1.hash()).unwrap().is_some());
    }

    #[test]
    fn disconnect_empty_errors() {
        let store = MemoryBlockStore::new();
        assert!(store.disconnect_tip().is_err());
    }

    #[test]
    fn sync_is_counted() {
        let store = MemoryBlockStore::new();
        store.sync().unwrap();
        store.sync().unwrap();
        assert_eq!(store.sync_count(), 2);
    }
}
