//! Block ingest and inventory reconciliation.
//!
//! [`BlockHandler`] runs on the block task and is the only caller of
//! [`ChainEngine::process_block`]. Blocks and inventory are handled whole,
//! in the order they arrive.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, trace, warn};

use tarn_core::constants::{BLOCK_LOG_INTERVAL, MAX_INV_PER_MSG};
use tarn_core::traits::{BlockStore, ChainEngine};
use tarn_core::types::{Block, Hash256};
use tarn_network::{MsgGetData, MsgInv, PeerMessage, PeerSession};

use crate::origins::BlockOrigins;

/// One progress line's worth of block processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub blocks: u64,
    pub transactions: u64,
    pub elapsed: Duration,
    pub height: u64,
}

fn plural(n: u64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}

impl fmt::Display for ProgressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} {} in the last {:?} ({} {}, height {})",
            self.blocks,
            plural(self.blocks, "block", "blocks"),
            self.elapsed,
            self.transactions,
            plural(self.transactions, "transaction", "transactions"),
            self.height,
        )
    }
}

/// Rate-limited block processing progress.
///
/// Counts blocks and transactions and yields a summary at most once per
/// interval, resetting the counts each time.
#[derive(Debug)]
pub struct BlockProgressLogger {
    received_blocks: u64,
    received_txs: u64,
    last_log: Instant,
    interval: Duration,
}

impl BlockProgressLogger {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            received_blocks: 0,
            received_txs: 0,
            last_log: now,
            interval,
        }
    }

    /// Blocks and transactions counted since the last summary.
    pub fn pending(&self) -> (u64, u64) {
        (self.received_blocks, self.received_txs)
    }

    /// Count one processed block with `num_txs` transactions.
    pub fn record(&mut self, num_txs: u64, height: u64, now: Instant) -> Option<ProgressSummary> {
        self.received_blocks += 1;
        self.received_txs += num_txs;

        let elapsed = now.saturating_duration_since(self.last_log);
        if elapsed < self.interval {
            return None;
        }

        // Whole hundredths of a second.
        let elapsed = Duration::from_millis((elapsed.as_millis() / 10 * 10) as u64);
        let summary = ProgressSummary {
            blocks: self.received_blocks,
            transactions: self.received_txs,
            elapsed,
            height,
        };
        self.received_blocks = 0;
        self.received_txs = 0;
        self.last_log = now;
        Some(summary)
    }
}

pub struct BlockHandler {
    chain: Arc<dyn ChainEngine>,
    store: Arc<dyn BlockStore>,
    origins: Arc<BlockOrigins>,
    progress: BlockProgressLogger,
}

impl BlockHandler {
    pub fn new(
        chain: Arc<dyn ChainEngine>,
        store: Arc<dyn BlockStore>,
        origins: Arc<BlockOrigins>,
    ) -> Self {
        Self {
            chain,
            store,
            origins,
            progress: BlockProgressLogger::new(BLOCK_LOG_INTERVAL, Instant::now()),
        }
    }

    pub fn progress(&self) -> &BlockProgressLogger {
        &self.progress
    }

    /// Submit a block received from `peer` to the chain engine.
    pub fn handle_block(&mut self, block: &Block, peer: Arc<dyn PeerSession>) {
        let hash = block.hash();
        let peer_id = peer.id();
        self.origins.insert(hash, peer);

        if let Err(e) = self.chain.process_block(block) {
            self.origins.remove(&hash);
            warn!(%hash, peer = %peer_id, "failed to process block: {e}");
            return;
        }

        // Only blocks still held as orphans keep an origin. Connecting this
        // block may have resolved orphans queued earlier, and adding it to a
        // full pool may have evicted one.
        self.origins
            .lock()
            .retain(|h, _| self.chain.is_known_orphan(h));

        let height = match self.store.chain_tip() {
            Ok((height, _)) => height,
            Err(e) => {
                warn!("failed to get best block height: {e}");
                return;
            }
        };
        if let Some(summary) = self.progress.record(block.tx_count(), height, Instant::now()) {
            info!("{summary}");
        }

        if let Err(e) = self.store.sync() {
            warn!("failed to sync block database: {e}");
        }
    }

    /// Reconcile a peer's inventory announcement with what we have and
    /// request what we lack.
    pub fn handle_inv(&self, inv: &MsgInv, peer: &Arc<dyn PeerSession>) {
        let last_block = inv.inventory.iter().rposition(|iv| iv.is_block());

        for (i, iv) in inv.inventory.iter().enumerate() {
            if !iv.is_block() {
                trace!(peer = %peer.id(), inv = %iv, "ignoring non-block inventory");
                continue;
            }

            peer.add_known_inventory(iv);

            if !self.chain.have_inventory(iv) {
                peer.queue_request(*iv);
                continue;
            }

            if self.chain.is_known_orphan(&iv.hash) {
                // Ask for everything between our tip and the orphan's
                // earliest missing ancestor.
                let root = self.chain.orphan_root(&iv.hash);
                match self.chain.latest_block_locator() {
                    Ok(locator) => self.send_get_blocks(peer, locator, root),
                    Err(e) => error!("failed to get block locator for the latest block: {e}"),
                }
                continue;
            }

            // Known side-chain block at the end of the announcement: ask for
            // whatever follows it so a stalled side chain keeps moving.
            if Some(i) == last_block {
                let locator = self.chain.block_locator_from_hash(&iv.hash);
                self.send_get_blocks(peer, locator, Hash256::ZERO);
            }
        }

        let requested = peer.drain_requests(MAX_INV_PER_MSG);
        if requested.is_empty() {
            return;
        }
        trace!(peer = %peer.id(), count = requested.len(), "requesting blocks");
        let msg = PeerMessage::GetData(MsgGetData {
            inventory: requested,
        });
        if let Err(e) = peer.queue_message(msg) {
            warn!(peer = %peer.id(), "failed to send getdata: {e}");
        }
    }

    fn send_get_blocks(&self, peer: &Arc<dyn PeerSession>, locator: Vec<Hash256>, stop: Hash256) {
        if let Err(e) = peer.push_get_blocks(locator, stop) {
            warn!(peer = %peer.id(), "failed to send getblocks: {e}");
        }
    }
}
