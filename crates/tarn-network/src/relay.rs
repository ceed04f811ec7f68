//! Inventory relay to connected peers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use tarn_core::types::InvVect;

use crate::peer::{PeerId, PeerSession};
use crate::protocol::{MsgInv, PeerMessage};

/// Something that can announce an inventory vector to the network.
pub trait InventoryRelay: Send + Sync {
    fn relay_inventory(&self, inv: InvVect);
}

/// Registry of connected peers; relays inventory to each of them.
#[derive(Default)]
pub struct PeerSet {
    peers: RwLock<HashMap<PeerId, Arc<dyn PeerSession>>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, peer: Arc<dyn PeerSession>) {
        info!(peer = %peer.id(), addr = %peer.addr(), "peer registered");
        self.peers.write().insert(peer.id(), peer);
    }

    pub fn unregister(&self, id: PeerId) -> Option<Arc<dyn PeerSession>> {
        let removed = self.peers.write().remove(&id);
        if removed.is_some() {
            info!(peer = %id, "peer unregistered");
        }
        removed
    }

    pub fn get(&self, id: PeerId) -> Option<Arc<dyn PeerSession>> {
        self.peers.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl InventoryRelay for PeerSet {
    /// Send `inv` to every peer not already known to have it.
    fn relay_inventory(&self, inv: InvVect) {
        let peers: Vec<_> = self.peers.read().values().cloned().collect();
        for peer in peers {
            if peer.knows_inventory(&inv) {
                continue;
            }
            peer.add_known_inventory(&inv);
            let msg = PeerMessage::Inv(MsgInv {
                inventory: vec![inv],
            });
            if let Err(e) = peer.queue_message(msg) {
                debug!(peer = %peer.id(), "failed to relay inventory: {e}");
            }
        }
    }
}
