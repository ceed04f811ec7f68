//! Peer sessions as seen by the block manager.
//!
//! A [`Peer`] is a handle to one connected, handshake-complete remote node.
//! Outbound messages go onto an unbounded queue whose receiver belongs to
//! the connection writer, so sending never blocks the caller.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use tarn_core::error::NetworkError;
use tarn_core::types::{BlockLocator, Hash256, InvVect, ServiceFlags};

use crate::config::NetworkConfig;
use crate::protocol::{MsgGetBlocks, PeerMessage};

/// Identifier assigned to a connection when it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// A connected peer, as consumed by the sync coordinator, the inventory
/// reconciler and the notification dispatcher.
pub trait PeerSession: Send + Sync {
    fn id(&self) -> PeerId;

    fn addr(&self) -> SocketAddr;

    /// Best height the peer announced in its handshake.
    fn announced_height(&self) -> u64;

    fn services(&self) -> ServiceFlags;

    /// Queue a message for delivery to the peer.
    fn queue_message(&self, msg: PeerMessage) -> Result<(), NetworkError>;

    /// Ask the peer for block inventory after `locator`, up to `stop_hash`.
    fn push_get_blocks(&self, locator: BlockLocator, stop_hash: Hash256) -> Result<(), NetworkError> {
        self.queue_message(PeerMessage::GetBlocks(MsgGetBlocks::new(locator, stop_hash)))
    }

    /// Remember that the peer has `inv`.
    fn add_known_inventory(&self, inv: &InvVect);

    fn knows_inventory(&self, inv: &InvVect) -> bool;

    /// Append `inv` to the pending-request queue.
    fn queue_request(&self, inv: InvVect);

    /// Remove and return up to `max` pending requests, oldest first.
    fn drain_requests(&self, max: usize) -> Vec<InvVect>;
}

/// Bounded set of inventory vectors. Re-adding an entry refreshes it; the
/// least recently added entry is evicted when full.
#[derive(Debug)]
pub struct KnownInventory {
    items: HashSet<InvVect>,
    order: VecDeque<InvVect>,
    capacity: usize,
}

impl KnownInventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, inv: InvVect) {
        if self.capacity == 0 {
            return;
        }
        if self.items.contains(&inv) {
            self.order.retain(|i| *i != inv);
            self.order.push_back(inv);
            return;
        }
        if self.items.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.items.remove(&oldest);
            }
        }
        self.items.insert(inv);
        self.order.push_back(inv);
    }

    pub fn contains(&self, inv: &InvVect) -> bool {
        self.items.contains(inv)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Channel-backed [`PeerSession`].
pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
    services: ServiceFlags,
    announced_height: AtomicU64,
    outbound: mpsc::UnboundedSender<PeerMessage>,
    known_inventory: Mutex<KnownInventory>,
    requests: Mutex<VecDeque<InvVect>>,
}

impl Peer {
    /// Create a session handle. The returned receiver yields every message
    /// queued for this peer, in order.
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        services: ServiceFlags,
        announced_height: u64,
        config: &NetworkConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PeerMessage>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Self {
            id,
            addr,
            services,
            announced_height: AtomicU64::new(announced_height),
            outbound,
            known_inventory: Mutex::new(KnownInventory::new(config.known_inventory_capacity)),
            requests: Mutex::new(VecDeque::new()),
        });
        (peer, rx)
    }

    /// Record a newer height announced by the peer.
    pub fn update_announced_height(&self, height: u64) {
        self.announced_height.fetch_max(height, Ordering::Relaxed);
    }

    /// Number of requests waiting to be sent in a `getdata`.
    pub fn pending_requests(&self) -> usize {
        self.requests.lock().len()
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("announced_height", &self.announced_height())
            .finish()
    }
}

impl PeerSession for Peer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn announced_height(&self) -> u64 {
        self.announced_height.load(Ordering::Relaxed)
    }

    fn services(&self) -> ServiceFlags {
        self.services
    }

    fn queue_message(&self, msg: PeerMessage) -> Result<(), NetworkError> {
        trace!(peer = %self.id, command = msg.command(), "queueing message");
        self.outbound
            .send(msg)
            .map_err(|_| NetworkError::PeerDisconnected(self.addr.to_string()))
    }

    fn add_known_inventory(&self, inv: &InvVect) {
        self.known_inventory.lock().insert(*inv);
    }

    fn knows_inventory(&self, inv: &InvVect) -> bool {
        self.known_inventory.lock().contains(inv)
    }

    fn queue_request(&self, inv: InvVect) {
        self.requests.lock().push_back(inv);
    }

    fn drain_requests(&self, max: usize) -> Vec<InvVect> {
        let mut requests = self.requests.lock();
        let n = max.min(requests.len());
        requests.drain(..n).collect()
    }
}
