//! Shared test helpers for the end-to-end tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use tarn_chain::BlockChain;
use tarn_chain::testing::build_chain;
use tarn_core::constants::NetworkType;
use tarn_core::genesis::genesis_block;
use tarn_core::store::MemoryBlockStore;
use tarn_core::traits::{BlockStore, ChainNotification};
use tarn_core::types::{Block, InvVect, ServiceFlags};
use tarn_network::{InventoryRelay, NetworkConfig, Peer, PeerId, PeerMessage};
use tarn_node_lib::BlockManager;

pub const NET: NetworkType = NetworkType::Regtest;

/// How long to wait for an asynchronous effect before failing the test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Relay that records every inventory vector it is asked to announce.
#[derive(Default)]
pub struct RecordingRelay {
    relayed: Mutex<Vec<InvVect>>,
}

impl RecordingRelay {
    pub fn relayed(&self) -> Vec<InvVect> {
        self.relayed.lock().clone()
    }
}

impl InventoryRelay for RecordingRelay {
    fn relay_inventory(&self, inv: InvVect) {
        self.relayed.lock().push(inv);
    }
}

/// A chain engine over a memory store holding genesis plus `height` blocks.
pub struct LocalChain {
    pub chain: Arc<BlockChain>,
    pub store: Arc<MemoryBlockStore>,
    pub notifications: mpsc::UnboundedReceiver<ChainNotification>,
    /// Main-chain blocks above genesis, in height order.
    pub blocks: Vec<Block>,
}

pub fn local_chain(height: usize) -> LocalChain {
    let store = Arc::new(MemoryBlockStore::new());
    let genesis = genesis_block(NET);
    store.connect_block(genesis, 0).unwrap();
    let blocks = build_chain(genesis, height, 0);
    for (i, block) in blocks.iter().enumerate() {
        store.connect_block(block, i as u64 + 1).unwrap();
    }
    let (tx, notifications) = mpsc::unbounded_channel();
    let chain = Arc::new(BlockChain::new(NET, store.clone(), tx).unwrap());
    LocalChain {
        chain,
        store,
        notifications,
        blocks,
    }
}

/// A running block manager with a recording relay.
pub struct TestNode {
    pub manager: BlockManager,
    pub chain: Arc<BlockChain>,
    pub store: Arc<MemoryBlockStore>,
    pub relay: Arc<RecordingRelay>,
    pub blocks: Vec<Block>,
}

impl TestNode {
    /// Start a manager over a local chain of `height` blocks. Must be
    /// called from within a tokio runtime.
    pub fn start(height: usize) -> Self {
        let local = local_chain(height);
        let relay = Arc::new(RecordingRelay::default());
        let manager = BlockManager::new(
            local.chain.clone(),
            local.store.clone(),
            relay.clone(),
            local.notifications,
            8,
        );
        manager.start();
        Self {
            manager,
            chain: local.chain,
            store: local.store,
            relay,
            blocks: local.blocks,
        }
    }
}

/// A full-node peer announcing `height`.
pub fn connect_peer(id: u64, height: u64) -> (Arc<Peer>, mpsc::UnboundedReceiver<PeerMessage>) {
    Peer::new(
        PeerId(id),
        format!("127.0.0.1:{}", 40000 + id).parse().unwrap(),
        ServiceFlags::NODE_NETWORK,
        height,
        &NetworkConfig::regtest(),
    )
}

/// Wait for the next message queued for a peer.
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<PeerMessage>) -> PeerMessage {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for peer message")
        .expect("peer channel closed")
}

/// Messages already queued for a peer, without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<PeerMessage>) -> Vec<PeerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Poll `cond` until it holds.
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {WAIT:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give spawned notification tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
