//! The block manager: lifecycle and submission API.
//!
//! Three long-running tasks:
//! - the sync task owns the [`SyncCoordinator`] and consumes candidate and
//!   peer-done events;
//! - the block task owns the [`BlockHandler`] and consumes block and
//!   inventory messages, so chain mutations are serialized;
//! - the notification task spawns one short task per chain notification.
//!
//! All three stop when the quit signal fires. Peers talk to the manager
//! only through the `queue_*` / `notify_*` methods.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use tarn_core::constants::CHAN_BUFFER_SIZE;
use tarn_core::error::TarnError;
use tarn_core::traits::{BlockStore, ChainEngine, ChainNotification};
use tarn_core::types::Block;
use tarn_network::{InventoryRelay, MsgInv, PeerSession};

use crate::ingest::BlockHandler;
use crate::notify::NotificationDispatcher;
use crate::origins::BlockOrigins;
use crate::sync::SyncCoordinator;

struct BlockRequest {
    block: Block,
    peer: Arc<dyn PeerSession>,
    done: oneshot::Sender<bool>,
}

struct InvRequest {
    inv: MsgInv,
    peer: Arc<dyn PeerSession>,
}

/// Receiving ends, moved into the tasks by [`BlockManager::start`].
struct Queues {
    blocks: mpsc::Receiver<BlockRequest>,
    invs: mpsc::Receiver<InvRequest>,
    candidates: mpsc::Receiver<Arc<dyn PeerSession>>,
    done_peers: mpsc::Receiver<Arc<dyn PeerSession>>,
    notifications: mpsc::UnboundedReceiver<ChainNotification>,
}

pub struct BlockManager {
    chain: Arc<dyn ChainEngine>,
    store: Arc<dyn BlockStore>,
    relay: Arc<dyn InventoryRelay>,
    origins: Arc<BlockOrigins>,
    started: AtomicBool,
    shutdown: Arc<AtomicBool>,
    quit: watch::Sender<bool>,
    block_tx: mpsc::Sender<BlockRequest>,
    inv_tx: mpsc::Sender<InvRequest>,
    candidate_tx: mpsc::Sender<Arc<dyn PeerSession>>,
    done_tx: mpsc::Sender<Arc<dyn PeerSession>>,
    queues: Mutex<Option<Queues>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BlockManager {
    /// Create a stopped manager. `notifications` is the receiving end of
    /// the channel the chain engine publishes on; `max_peers` sizes the
    /// candidate and peer-done queues.
    pub fn new(
        chain: Arc<dyn ChainEngine>,
        store: Arc<dyn BlockStore>,
        relay: Arc<dyn InventoryRelay>,
        notifications: mpsc::UnboundedReceiver<ChainNotification>,
        max_peers: usize,
    ) -> Self {
        let peer_queue = max_peers.max(1);
        let (block_tx, blocks) = mpsc::channel(CHAN_BUFFER_SIZE);
        let (inv_tx, invs) = mpsc::channel(CHAN_BUFFER_SIZE);
        let (candidate_tx, candidates) = mpsc::channel(peer_queue);
        let (done_tx, done_peers) = mpsc::channel(peer_queue);
        let (quit, _) = watch::channel(false);

        Self {
            chain,
            store,
            relay,
            origins: Arc::new(BlockOrigins::new()),
            started: AtomicBool::new(false),
            shutdown: Arc::new(AtomicBool::new(false)),
            quit,
            block_tx,
            inv_tx,
            candidate_tx,
            done_tx,
            queues: Mutex::new(Some(Queues {
                blocks,
                invs,
                candidates,
                done_peers,
                notifications,
            })),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.load(Ordering::SeqCst)
    }

    /// Blocks currently mapped to the peer that supplied them.
    pub fn pending_origins(&self) -> usize {
        self.origins.len()
    }

    /// Spawn the sync, block and notification tasks. Must be called from
    /// within a tokio runtime. Calling it again has no effect.
    pub fn start(&self) {
        // The task list doubles as the lifecycle lock: `stop` cannot collect
        // handles while tasks are being spawned.
        let mut tasks = self.tasks.lock();
        if self.shutdown.load(Ordering::SeqCst) || self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(queues) = self.queues.lock().take() else {
            return;
        };
        trace!("starting block manager");

        let coordinator = SyncCoordinator::new(
            self.chain.clone(),
            self.store.clone(),
            self.shutdown.clone(),
        );
        let handler = BlockHandler::new(self.chain.clone(), self.store.clone(), self.origins.clone());
        let dispatcher = NotificationDispatcher::new(
            self.chain.clone(),
            self.origins.clone(),
            self.relay.clone(),
        );

        tasks.push(tokio::spawn(sync_task(
            coordinator,
            queues.candidates,
            queues.done_peers,
            self.quit.subscribe(),
        )));
        tasks.push(tokio::spawn(block_task(
            handler,
            queues.blocks,
            queues.invs,
            self.quit.subscribe(),
        )));
        tasks.push(tokio::spawn(notification_task(
            dispatcher,
            queues.notifications,
            self.quit.subscribe(),
        )));
    }

    /// Signal the tasks to quit and wait for them. A second call only
    /// logs a warning. Returns an error if a task panicked.
    pub async fn stop(&self) -> Result<(), TarnError> {
        let handles = {
            let mut tasks = self.tasks.lock();
            if self.shutdown.swap(true, Ordering::SeqCst) {
                warn!("block manager is already in the process of shutting down");
                return Ok(());
            }

            info!("block manager shutting down");
            self.quit.send_replace(true);
            // Never started: drop the queues so pending submitters are released.
            self.queues.lock().take();
            std::mem::take(&mut *tasks)
        };

        let mut result = Ok(());
        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    result = Err(TarnError::Shutdown(format!("block manager task panicked: {e}")));
                }
            }
        }
        result
    }

    /// Submit a block received from `peer` and wait until it has been
    /// processed. Returns `false` if the manager is shutting down or stops
    /// before the block is handled.
    pub async fn queue_block(&self, block: Block, peer: Arc<dyn PeerSession>) -> bool {
        if self.shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let (done, processed) = oneshot::channel();
        let request = BlockRequest { block, peer, done };
        if self.block_tx.send(request).await.is_err() {
            return false;
        }
        processed.await.unwrap_or(false)
    }

    /// Submit an inventory announcement from `peer`. Never blocks; the
    /// message is dropped if the queue is full.
    pub fn queue_inv(&self, inv: MsgInv, peer: Arc<dyn PeerSession>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let peer_id = peer.id();
        match self.inv_tx.try_send(InvRequest { inv, peer }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(peer = %peer_id, "inventory queue full, dropping inv");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(peer = %peer_id, "inventory queue closed");
            }
        }
    }

    /// A peer finished its handshake and may be used for syncing.
    pub async fn notify_new_candidate(&self, peer: Arc<dyn PeerSession>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if self.candidate_tx.send(peer).await.is_err() {
            debug!("candidate queue closed");
        }
    }

    /// A peer disconnected.
    pub async fn notify_peer_done(&self, peer: Arc<dyn PeerSession>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if self.done_tx.send(peer).await.is_err() {
            debug!("peer-done queue closed");
        }
    }
}

async fn sync_task(
    mut coordinator: SyncCoordinator,
    mut candidates: mpsc::Receiver<Arc<dyn PeerSession>>,
    mut done_peers: mpsc::Receiver<Arc<dyn PeerSession>>,
    mut quit: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = quit.changed() => break,
            Some(peer) = candidates.recv() => coordinator.on_new_candidate(peer),
            Some(peer) = done_peers.recv() => coordinator.on_peer_done(&peer),
            else => break,
        }
    }
    trace!("sync task done");
}

async fn block_task(
    mut handler: BlockHandler,
    mut blocks: mpsc::Receiver<BlockRequest>,
    mut invs: mpsc::Receiver<InvRequest>,
    mut quit: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = quit.changed() => break,
            Some(req) = blocks.recv() => {
                handler.handle_block(&req.block, req.peer);
                let _ = req.done.send(true);
            }
            Some(req) = invs.recv() => handler.handle_inv(&req.inv, &req.peer),
            else => break,
        }
    }
    trace!("block task done");
}

async fn notification_task(
    dispatcher: NotificationDispatcher,
    mut notifications: mpsc::UnboundedReceiver<ChainNotification>,
    mut quit: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = quit.changed() => break,
            Some(notification) = notifications.recv() => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.handle(notification) });
            }
            else => break,
        }
    }
    trace!("notification task done");
}
