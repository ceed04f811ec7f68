//! Block index, orphan pool and best-chain selection.
//!
//! The index holds every block the engine has accepted, main chain and side
//! chains alike, as `hash → (parent, height, on-main-chain)`. Main-chain
//! bodies live in the [`BlockStore`]; side-chain bodies are kept in memory
//! until a reorganization connects them.
//!
//! The best chain is the one with the greatest height. Ties keep the chain
//! that got there first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tarn_core::constants::{MAX_ORPHAN_BLOCKS, NetworkType};
use tarn_core::error::{BlockError, ChainError, TarnError};
use tarn_core::genesis::genesis_hash;
use tarn_core::traits::{BlockOutcome, BlockStore, ChainEngine, ChainNotification};
use tarn_core::types::{Block, BlockLocator, Hash256, InvType, InvVect};

use crate::validation::check_block_sanity;

/// Locator entries before the step between entries starts doubling.
const LOCATOR_DENSE_ENTRIES: usize = 10;

#[derive(Debug, Clone, Copy)]
struct BlockNode {
    parent: Hash256,
    height: u64,
    main: bool,
}

#[derive(Default)]
struct ChainIndex {
    nodes: HashMap<Hash256, BlockNode>,
    /// Bodies of indexed blocks that are not in the store.
    side_blocks: HashMap<Hash256, Block>,
    best: Hash256,
    orphans: HashMap<Hash256, Block>,
    /// Parent hash → orphans waiting on it.
    orphans_by_prev: HashMap<Hash256, Vec<Hash256>>,
    /// Insertion order, oldest first.
    orphan_order: VecDeque<Hash256>,
}

impl ChainIndex {
    fn best_height(&self) -> u64 {
        self.nodes.get(&self.best).map_or(0, |node| node.height)
    }

    fn add_orphan(&mut self, block: Block) {
        while self.orphans.len() >= MAX_ORPHAN_BLOCKS {
            let Some(oldest) = self.orphan_order.front().copied() else {
                break;
            };
            debug!(hash = %oldest, "evicting oldest orphan");
            self.remove_orphan(&oldest);
        }

        let hash = block.hash();
        self.orphans_by_prev
            .entry(block.header.prev_hash)
            .or_default()
            .push(hash);
        self.orphan_order.push_back(hash);
        self.orphans.insert(hash, block);
    }

    fn remove_orphan(&mut self, hash: &Hash256) -> Option<Block> {
        let block = self.orphans.remove(hash)?;
        let prev = block.header.prev_hash;
        if let Some(siblings) = self.orphans_by_prev.get_mut(&prev) {
            siblings.retain(|h| h != hash);
            if siblings.is_empty() {
                self.orphans_by_prev.remove(&prev);
            }
        }
        self.orphan_order.retain(|h| h != hash);
        Some(block)
    }

    fn node(&self, hash: &Hash256) -> Result<BlockNode, TarnError> {
        self.nodes
            .get(hash)
            .copied()
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()).into())
    }
}

/// Reference [`ChainEngine`] backed by a [`BlockStore`].
pub struct BlockChain {
    network: NetworkType,
    genesis: Hash256,
    store: Arc<dyn BlockStore>,
    index: RwLock<ChainIndex>,
    notifications: mpsc::UnboundedSender<ChainNotification>,
}

impl BlockChain {
    /// Build the block index from the main chain already in `store`.
    ///
    /// The store must contain at least the genesis block of `network`.
    /// Notifications are never dropped: connecting a long orphan chain can
    /// emit many events from a single `process_block`.
    pub fn new(
        network: NetworkType,
        store: Arc<dyn BlockStore>,
        notifications: mpsc::UnboundedSender<ChainNotification>,
    ) -> Result<Self, TarnError> {
        let genesis = genesis_hash(network);
        let (tip_height, tip_hash) = store.chain_tip()?;
        if tip_hash.is_zero() {
            return Err(ChainError::EmptyChain.into());
        }
        let stored_genesis = store.get_block_hash(0)?.ok_or(ChainError::EmptyChain)?;
        if stored_genesis != genesis {
            return Err(ChainError::GenesisMismatch {
                stored: stored_genesis.to_string(),
                expected: genesis.to_string(),
            }
            .into());
        }

        let mut index = ChainIndex::default();
        let mut parent = Hash256::ZERO;
        for height in 0..=tip_height {
            let hash = store
                .get_block_hash(height)?
                .ok_or_else(|| ChainError::BlockNotFound(format!("height {height}")))?;
            index.nodes.insert(
                hash,
                BlockNode {
                    parent,
                    height,
                    main: true,
                },
            );
            parent = hash;
        }
        index.best = tip_hash;
        info!(height = tip_height, hash = %tip_hash, "loaded block index");

        Ok(Self {
            network,
            genesis,
            store,
            index: RwLock::new(index),
            notifications,
        })
    }

    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// Hash of the main-chain tip.
    pub fn best_hash(&self) -> Hash256 {
        self.index.read().best
    }

    /// Height of the main-chain tip.
    pub fn best_height(&self) -> u64 {
        self.index.read().best_height()
    }

    /// Number of blocks currently in the orphan pool.
    pub fn orphan_count(&self) -> usize {
        self.index.read().orphans.len()
    }

    fn notify(&self, notification: ChainNotification) {
        if self.notifications.send(notification).is_err() {
            debug!("notification receiver dropped");
        }
    }

    fn process_locked(
        &self,
        index: &mut ChainIndex,
        block: &Block,
        events: &mut Vec<ChainNotification>,
    ) -> Result<BlockOutcome, TarnError> {
        let hash = block.hash();
        if index.nodes.contains_key(&hash) {
            return Err(BlockError::DuplicateBlock(hash.to_string()).into());
        }
        if index.orphans.contains_key(&hash) {
            return Err(BlockError::DuplicateOrphan(hash.to_string()).into());
        }
        check_block_sanity(block)?;

        if !index.nodes.contains_key(&block.header.prev_hash) {
            debug!(%hash, prev = %block.header.prev_hash, "adding orphan block");
            index.add_orphan(block.clone());
            events.push(ChainNotification::OrphanBlock(hash));
            return Ok(BlockOutcome::Orphan);
        }

        let outcome = self.accept_block(index, block.clone(), events)?;
        self.process_orphans(index, hash, events);
        Ok(outcome)
    }

    fn accept_block(
        &self,
        index: &mut ChainIndex,
        block: Block,
        events: &mut Vec<ChainNotification>,
    ) -> Result<BlockOutcome, TarnError> {
        let hash = block.hash();
        let parent_hash = block.header.prev_hash;
        let height = index.node(&parent_hash)?.height + 1;

        if parent_hash == index.best {
            self.store.connect_block(&block, height)?;
            index.nodes.insert(
                hash,
                BlockNode {
                    parent: parent_hash,
                    height,
                    main: true,
                },
            );
            index.best = hash;
            debug!(%hash, height, "connected block");
            events.push(ChainNotification::BlockConnected(hash));
            events.push(ChainNotification::BlockAccepted(block));
            return Ok(BlockOutcome::MainChain);
        }

        index.nodes.insert(
            hash,
            BlockNode {
                parent: parent_hash,
                height,
                main: false,
            },
        );
        index.side_blocks.insert(hash, block.clone());

        if height <= index.best_height() {
            debug!(%hash, height, "added block to side chain");
            return Ok(BlockOutcome::SideChain);
        }

        info!(%hash, height, "side chain became longest, reorganizing");
        self.reorganize(index, hash, events)?;
        events.push(ChainNotification::BlockAccepted(block));
        Ok(BlockOutcome::MainChain)
    }

    /// Switch the main chain so that it ends at `new_tip`.
    ///
    /// If the store fails partway, the previous main chain is put back
    /// before the error is returned and no events are emitted.
    fn reorganize(
        &self,
        index: &mut ChainIndex,
        new_tip: Hash256,
        events: &mut Vec<ChainNotification>,
    ) -> Result<(), TarnError> {
        let old_tip = index.best;
        let mut staged = Vec::new();
        match self.switch_main_chain(index, new_tip, &mut staged) {
            Ok(()) => {
                events.append(&mut staged);
                Ok(())
            }
            Err(e) => {
                warn!(%new_tip, "reorganization failed, restoring previous chain: {e}");
                if let Err(restore) = self.switch_main_chain(index, old_tip, &mut Vec::new()) {
                    error!(%old_tip, "failed to restore main chain: {restore}");
                }
                Err(e)
            }
        }
    }

    /// Disconnect back to the fork point with `new_tip`'s branch, then
    /// connect that branch. Index and store are updated one block at a time.
    fn switch_main_chain(
        &self,
        index: &mut ChainIndex,
        new_tip: Hash256,
        events: &mut Vec<ChainNotification>,
    ) -> Result<(), TarnError> {
        let mut attach = Vec::new();
        let mut cursor = new_tip;
        loop {
            let node = index.node(&cursor)?;
            if node.main {
                break;
            }
            attach.push(cursor);
            cursor = node.parent;
        }
        let fork = cursor;

        while index.best != fork {
            let detached = self.store.disconnect_tip()?;
            let node = index
                .nodes
                .get_mut(&detached)
                .ok_or_else(|| ChainError::BlockNotFound(detached.to_string()))?;
            node.main = false;
            index.best = node.parent;
            debug!(hash = %detached, "disconnected block");
            events.push(ChainNotification::BlockDisconnected(detached));
        }

        for hash in attach.into_iter().rev() {
            let block = match index.side_blocks.get(&hash) {
                Some(block) => block.clone(),
                None => self
                    .store
                    .get_block(&hash)?
                    .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))?,
            };
            let height = index.node(&hash)?.height;
            self.store.connect_block(&block, height)?;
            index.side_blocks.remove(&hash);
            if let Some(node) = index.nodes.get_mut(&hash) {
                node.main = true;
            }
            index.best = hash;
            debug!(%hash, height, "connected block");
            events.push(ChainNotification::BlockConnected(hash));
        }
        Ok(())
    }

    /// Accept every orphan that descends from `parent`, recursively.
    fn process_orphans(
        &self,
        index: &mut ChainIndex,
        parent: Hash256,
        events: &mut Vec<ChainNotification>,
    ) {
        let mut queue = vec![parent];
        while let Some(parent) = queue.pop() {
            let children = index.orphans_by_prev.get(&parent).cloned().unwrap_or_default();
            for child in children {
                let Some(block) = index.remove_orphan(&child) else {
                    continue;
                };
                match self.accept_block(index, block, events) {
                    Ok(_) => queue.push(child),
                    Err(e) => warn!(hash = %child, "failed to accept orphan: {e}"),
                }
            }
        }
    }

    fn locator_from(&self, index: &ChainIndex, hash: &Hash256) -> BlockLocator {
        let mut locator = vec![*hash];
        if *hash == self.genesis {
            return locator;
        }
        let Some(start) = index.nodes.get(hash) else {
            locator.push(self.genesis);
            return locator;
        };

        let mut cursor = *hash;
        let mut height = start.height;
        let mut step = 1u64;
        'walk: while height > 0 {
            let target = height.saturating_sub(step);
            while height > target {
                let Some(node) = index.nodes.get(&cursor) else {
                    break 'walk;
                };
                cursor = node.parent;
                height -= 1;
            }
            locator.push(cursor);
            if locator.len() > LOCATOR_DENSE_ENTRIES {
                step = step.saturating_mul(2);
            }
        }
        locator
    }
}

impl ChainEngine for BlockChain {
    fn process_block(&self, block: &Block) -> Result<BlockOutcome, TarnError> {
        let mut events = Vec::new();
        let result = {
            let mut index = self.index.write();
            self.process_locked(&mut index, block, &mut events)
        };
        for event in events {
            self.notify(event);
        }
        result
    }

    fn is_known_orphan(&self, hash: &Hash256) -> bool {
        self.index.read().orphans.contains_key(hash)
    }

    fn orphan_root(&self, hash: &Hash256) -> Hash256 {
        let index = self.index.read();
        let mut root = *hash;
        let mut prev = *hash;
        while let Some(orphan) = index.orphans.get(&prev) {
            root = prev;
            prev = orphan.header.prev_hash;
        }
        root
    }

    fn latest_block_locator(&self) -> Result<BlockLocator, TarnError> {
        let index = self.index.read();
        if index.best.is_zero() {
            return Err(ChainError::EmptyChain.into());
        }
        Ok(self.locator_from(&index, &index.best))
    }

    fn block_locator_from_hash(&self, hash: &Hash256) -> BlockLocator {
        let index = self.index.read();
        self.locator_from(&index, hash)
    }

    fn have_inventory(&self, inv: &InvVect) -> bool {
        match inv.inv_type {
            InvType::Block => {
                let index = self.index.read();
                index.nodes.contains_key(&inv.hash) || index.orphans.contains_key(&inv.hash)
            }
            InvType::Tx | InvType::Error => false,
        }
    }
}
