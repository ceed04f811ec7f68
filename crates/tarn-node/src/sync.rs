//! Sync-peer selection.
//!
//! The coordinator owns the candidate set and the active sync peer. Only
//! the sync task touches it, so no locking is needed. Selection runs
//! whenever a candidate joins or the active sync peer leaves; there is no
//! retry timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use tarn_core::traits::{BlockStore, ChainEngine};
use tarn_core::types::{Hash256, ServiceFlags};
use tarn_network::{PeerId, PeerSession};

pub struct SyncCoordinator {
    chain: Arc<dyn ChainEngine>,
    store: Arc<dyn BlockStore>,
    shutdown: Arc<AtomicBool>,
    candidates: Vec<Arc<dyn PeerSession>>,
    sync_peer: Option<Arc<dyn PeerSession>>,
}

impl SyncCoordinator {
    pub fn new(
        chain: Arc<dyn ChainEngine>,
        store: Arc<dyn BlockStore>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            chain,
            store,
            shutdown,
            candidates: Vec::new(),
            sync_peer: None,
        }
    }

    /// The peer blocks are currently being downloaded from.
    pub fn sync_peer(&self) -> Option<PeerId> {
        self.sync_peer.as_ref().map(|p| p.id())
    }

    pub fn candidates(&self) -> Vec<PeerId> {
        self.candidates.iter().map(|p| p.id()).collect()
    }

    /// A connected peer may serve as a sync source.
    pub fn on_new_candidate(&mut self, peer: Arc<dyn PeerSession>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if !peer.services().contains(ServiceFlags::NODE_NETWORK) {
            debug!(peer = %peer.id(), "ignoring candidate without full-node service");
            return;
        }
        debug!(peer = %peer.id(), height = peer.announced_height(), "new sync candidate");
        self.candidates.push(peer);
        self.select_sync();
    }

    /// A peer disconnected. Re-selects if it was the sync peer.
    pub fn on_peer_done(&mut self, peer: &Arc<dyn PeerSession>) {
        let id = peer.id();
        self.candidates.retain(|p| p.id() != id);

        if self.sync_peer.as_ref().is_some_and(|p| p.id() == id) {
            info!(peer = %id, "sync peer disconnected");
            self.sync_peer = None;
            self.select_sync();
        }
    }

    /// Pick a sync peer if none is active and ask it for blocks.
    pub fn select_sync(&mut self) {
        if self.sync_peer.is_some() {
            return;
        }

        let height = match self.store.chain_tip() {
            Ok((height, _)) => height,
            Err(e) => {
                error!("failed to read best height: {e}");
                return;
            }
        };

        self.candidates.retain(|peer| {
            let ahead = peer.announced_height() > height;
            if !ahead {
                debug!(peer = %peer.id(), "dropping candidate that is not ahead of us");
            }
            ahead
        });

        // First remaining candidate, not necessarily the tallest.
        let Some(best) = self.candidates.first().cloned() else {
            debug!(height, "no sync candidates ahead of local chain");
            return;
        };

        let locator = match self.chain.latest_block_locator() {
            Ok(locator) => locator,
            Err(e) => {
                error!("failed to build block locator for the latest block: {e}");
                return;
            }
        };

        info!(
            peer = %best.id(),
            addr = %best.addr(),
            height = best.announced_height(),
            "syncing to block height from peer"
        );
        if let Err(e) = best.push_get_blocks(locator, Hash256::ZERO) {
            warn!(peer = %best.id(), "failed to send getblocks: {e}");
        }
        self.sync_peer = Some(best);
    }
}
