//! Collaborator interfaces consumed by the block manager.
//!
//! - [`ChainEngine`]: validation, best-chain selection and the orphan pool (tarn-chain implements)
//! - [`BlockStore`]: durable main-chain storage (tarn-node implements with RocksDB)
//!
//! Both take `&self` everywhere: implementations guard their own state, so a
//! single `Arc` can be shared between the block task and the sync task.

use crate::error::TarnError;
use crate::types::{Block, BlockLocator, Hash256, InvVect};

/// Where a block ended up after the chain engine accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Connected to (or caused a reorganization onto) the main chain.
    MainChain,
    /// Stored on a side chain that is not (yet) longer than the main chain.
    SideChain,
    /// Parent unknown; held in the orphan pool.
    Orphan,
}

impl BlockOutcome {
    pub fn is_orphan(&self) -> bool {
        matches!(self, BlockOutcome::Orphan)
    }
}

/// Asynchronous events emitted by the chain engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainNotification {
    /// A block was added to the orphan pool. Carries the orphan's hash.
    OrphanBlock(Hash256),
    /// A block was accepted onto the main chain.
    BlockAccepted(Block),
    /// A block was connected to the main chain tip (including during reorgs).
    BlockConnected(Hash256),
    /// A block was disconnected from the main chain tip during a reorg.
    BlockDisconnected(Hash256),
}

impl ChainNotification {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainNotification::OrphanBlock(_) => "orphan_block",
            ChainNotification::BlockAccepted(_) => "block_accepted",
            ChainNotification::BlockConnected(_) => "block_connected",
            ChainNotification::BlockDisconnected(_) => "block_disconnected",
        }
    }
}

/// Chain validation engine.
///
/// `process_block` is the only mutating call; the block manager invokes it
/// from a single task so implementations never see concurrent mutation,
/// although read-only calls may arrive from other tasks at any time.
pub trait ChainEngine: Send + Sync {
    /// Validate a block and connect it, store it on a side chain, or hold it as an orphan.
    fn process_block(&self, block: &Block) -> Result<BlockOutcome, TarnError>;

    /// Whether `hash` is currently held in the orphan pool.
    fn is_known_orphan(&self, hash: &Hash256) -> bool;

    /// Walk the orphan pool back from `hash` to the earliest orphan whose
    /// parent is missing. Returns `hash` itself if it is not an orphan.
    fn orphan_root(&self, hash: &Hash256) -> Hash256;

    /// Locator for the current best block.
    fn latest_block_locator(&self) -> Result<BlockLocator, TarnError>;

    /// Locator starting at `hash`. An unknown hash yields a locator that
    /// starts with `hash` and continues at genesis.
    fn block_locator_from_hash(&self, hash: &Hash256) -> BlockLocator;

    /// Whether the engine already has the item (main chain, side chain or orphan pool).
    fn have_inventory(&self, inv: &InvVect) -> bool;
}

/// Durable storage of the main chain.
pub trait BlockStore: Send + Sync {
    /// Current tip as `(height, hash)`. Returns `(0, Hash256::ZERO)` when empty.
    fn chain_tip(&self) -> Result<(u64, Hash256), TarnError>;

    /// Whether no block (not even genesis) has been stored.
    ///
    /// Default implementation: the tip hash is zero, or the tip cannot be read.
    fn is_empty(&self) -> bool {
        match self.chain_tip() {
            Ok((_, hash)) => hash.is_zero(),
            Err(_) => true,
        }
    }

    /// Append `block` at `height`, which must be exactly one above the tip
    /// (or zero for an empty store).
    fn connect_block(&self, block: &Block, height: u64) -> Result<(), TarnError>;

    /// Remove the tip from the main chain, returning its hash. Block data is kept.
    fn disconnect_tip(&self) -> Result<Hash256, TarnError>;

    /// Full block by hash, whether or not it is still on the main chain.
    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, TarnError>;

    /// Main-chain hash at `height`.
    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, TarnError>;

    /// Main-chain height of `hash`.
    fn get_height(&self, hash: &Hash256) -> Result<Option<u64>, TarnError>;

    /// Flush buffered writes to durable storage.
    fn sync(&self) -> Result<(), TarnError>;
}
