//! Reactions to chain engine notifications.
//!
//! The manager spawns one task per notification and hands it a clone of
//! the dispatcher.

use std::sync::Arc;

use tracing::{error, trace, warn};

use tarn_core::traits::{ChainEngine, ChainNotification};
use tarn_core::types::{Hash256, InvVect};
use tarn_network::InventoryRelay;

use crate::origins::BlockOrigins;

#[derive(Clone)]
pub struct NotificationDispatcher {
    chain: Arc<dyn ChainEngine>,
    origins: Arc<BlockOrigins>,
    relay: Arc<dyn InventoryRelay>,
}

impl NotificationDispatcher {
    pub fn new(
        chain: Arc<dyn ChainEngine>,
        origins: Arc<BlockOrigins>,
        relay: Arc<dyn InventoryRelay>,
    ) -> Self {
        Self {
            chain,
            origins,
            relay,
        }
    }

    pub fn handle(&self, notification: ChainNotification) {
        match notification {
            ChainNotification::OrphanBlock(hash) => self.handle_orphan(hash),
            ChainNotification::BlockAccepted(block) => {
                self.relay.relay_inventory(InvVect::block(block.hash()));
            }
            other => trace!(kind = other.kind(), "ignoring chain notification"),
        }
    }

    /// Ask the peer that supplied an orphan for the blocks it is missing.
    fn handle_orphan(&self, hash: Hash256) {
        let mut origins = self.origins.lock();
        let Some(peer) = origins.get(&hash).cloned() else {
            if self.chain.is_known_orphan(&hash) {
                warn!(%hash, "orphan block notification without a known origin peer");
            } else {
                trace!(%hash, "orphan resolved before its notification was handled");
            }
            return;
        };

        let root = self.chain.orphan_root(&hash);
        let locator = match self.chain.latest_block_locator() {
            Ok(locator) => locator,
            Err(e) => {
                error!("failed to get block locator for the latest block: {e}");
                return;
            }
        };
        if let Err(e) = peer.push_get_blocks(locator, root) {
            warn!(peer = %peer.id(), "failed to send getblocks: {e}");
        }
        origins.remove(&root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{NoLocatorChain, chain_at, peer, sent};
    use parking_lot::Mutex;
    use tarn_chain::testing::build_chain;
    use tarn_network::{MsgGetBlocks, PeerMessage, PeerSession};

    #[derive(Default)]
    struct RecordingRelay {
        relayed: Mutex<Vec<InvVect>>,
    }

    impl InventoryRelay for RecordingRelay {
        fn relay_inventory(&self, inv: InvVect) {
            self.relayed.lock().push(inv);
        }
    }

    #[test]
    fn accepted_block_is_relayed_once() {
        let fx = chain_at(1);
        let relay = Arc::new(RecordingRelay::default());
        let dispatcher =
            NotificationDispatcher::new(fx.chain, Arc::new(BlockOrigins::new()), relay.clone());

        dispatcher.handle(ChainNotification::BlockAccepted(fx.blocks[0].clone()));
        assert_eq!(*relay.relayed.lock(), vec![InvVect::block(fx.blocks[0].hash())]);
    }

    #[test]
    fn connect_and_disconnect_are_ignored() {
        let fx = chain_at(0);
        let relay = Arc::new(RecordingRelay::default());
        let dispatcher =
            NotificationDispatcher::new(fx.chain, Arc::new(BlockOrigins::new()), relay.clone());

        dispatcher.handle(ChainNotification::BlockConnected(Hash256([1; 32])));
        dispatcher.handle(ChainNotification::BlockDisconnected(Hash256([1; 32])));
        assert!(relay.relayed.lock().is_empty());
    }

    #[test]
    fn orphan_requests_ancestors_from_origin_and_clears_root() {
        let fx = chain_at(1);
        let locator = fx.chain.latest_block_locator().unwrap();
        let ahead = build_chain(&fx.blocks[0], 2, 3);
        fx.chain.process_block(&ahead[1]).unwrap();

        let origins = Arc::new(BlockOrigins::new());
        let (p, mut rx) = peer(2, 3);
        origins.insert(ahead[1].hash(), p);
        let dispatcher = NotificationDispatcher::new(
            fx.chain,
            origins.clone(),
            Arc::new(RecordingRelay::default()),
        );

        dispatcher.handle(ChainNotification::OrphanBlock(ahead[1].hash()));

        assert_eq!(
            sent(&mut rx),
            vec![PeerMessage::GetBlocks(MsgGetBlocks::new(locator, ahead[1].hash()))]
        );
        assert!(origins.is_empty());
    }

    #[test]
    fn orphan_without_origin_sends_nothing() {
        let fx = chain_at(0);
        let origins = Arc::new(BlockOrigins::new());
        let dispatcher = NotificationDispatcher::new(
            fx.chain,
            origins.clone(),
            Arc::new(RecordingRelay::default()),
        );
        dispatcher.handle(ChainNotification::OrphanBlock(Hash256([4; 32])));
        assert!(origins.is_empty());
    }

    #[test]
    fn locator_failure_leaves_origin_in_place() {
        let origins = Arc::new(BlockOrigins::new());
        let (p, mut rx) = peer(1, 3);
        let hash = Hash256([6; 32]);
        origins.insert(hash, p.clone() as Arc<dyn PeerSession>);
        let dispatcher = NotificationDispatcher::new(
            Arc::new(NoLocatorChain),
            origins.clone(),
            Arc::new(RecordingRelay::default()),
        );

        dispatcher.handle(ChainNotification::OrphanBlock(hash));
        assert!(origins.contains(&hash));
        assert!(sent(&mut rx).is_empty());
    }
}
