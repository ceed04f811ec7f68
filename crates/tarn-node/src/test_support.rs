//! Fixtures shared by the unit tests in this crate.

use std::sync::Arc;

use tokio::sync::mpsc;

use tarn_chain::BlockChain;
use tarn_chain::testing::build_chain;
use tarn_core::constants::NetworkType;
use tarn_core::error::{ChainError, TarnError};
use tarn_core::genesis::genesis_block;
use tarn_core::store::MemoryBlockStore;
use tarn_core::traits::{BlockOutcome, BlockStore, ChainEngine, ChainNotification};
use tarn_core::types::{Block, BlockLocator, Hash256, InvVect, ServiceFlags};
use tarn_network::{NetworkConfig, Peer, PeerId, PeerMessage};

pub const NET: NetworkType = NetworkType::Regtest;

pub struct ChainFixture {
    pub chain: Arc<BlockChain>,
    pub store: Arc<MemoryBlockStore>,
    pub notifications: mpsc::UnboundedReceiver<ChainNotification>,
    /// Main-chain blocks above genesis, in height order.
    pub blocks: Vec<Block>,
}

/// A chain engine over a memory store holding genesis plus `height` blocks.
pub fn chain_at(height: usize) -> ChainFixture {
    let store = Arc::new(MemoryBlockStore::new());
    let genesis = genesis_block(NET);
    store.connect_block(genesis, 0).unwrap();
    let blocks = build_chain(genesis, height, 0);
    for (i, block) in blocks.iter().enumerate() {
        store.connect_block(block, i as u64 + 1).unwrap();
    }
    let (tx, notifications) = mpsc::unbounded_channel();
    let chain = Arc::new(BlockChain::new(NET, store.clone(), tx).unwrap());
    ChainFixture {
        chain,
        store,
        notifications,
        blocks,
    }
}

pub fn peer_with(
    id: u64,
    height: u64,
    services: ServiceFlags,
) -> (Arc<Peer>, mpsc::UnboundedReceiver<PeerMessage>) {
    Peer::new(
        PeerId(id),
        format!("127.0.0.1:{}", 30000 + id).parse().unwrap(),
        services,
        height,
        &NetworkConfig::regtest(),
    )
}

pub fn peer(id: u64, height: u64) -> (Arc<Peer>, mpsc::UnboundedReceiver<PeerMessage>) {
    peer_with(id, height, ServiceFlags::NODE_NETWORK)
}

pub fn sent(rx: &mut mpsc::UnboundedReceiver<PeerMessage>) -> Vec<PeerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Chain engine whose locator lookups always fail.
pub struct NoLocatorChain;

impl ChainEngine for NoLocatorChain {
    fn process_block(&self, _block: &Block) -> Result<BlockOutcome, TarnError> {
        Ok(BlockOutcome::MainChain)
    }
    fn is_known_orphan(&self, _hash: &Hash256) -> bool {
        true
    }
    fn orphan_root(&self, hash: &Hash256) -> Hash256 {
        *hash
    }
    fn latest_block_locator(&self) -> Result<BlockLocator, TarnError> {
        Err(ChainError::EmptyChain.into())
    }
    fn block_locator_from_hash(&self, hash: &Hash256) -> BlockLocator {
        vec![*hash]
    }
    fn have_inventory(&self, _inv: &InvVect) -> bool {
        true
    }
}
