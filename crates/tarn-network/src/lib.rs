//! # tarn-network: peer-facing pieces of the block synchronization core.
//!
//! - [`protocol`]: the block-sync wire messages (`inv`, `getdata`, `getblocks`, `block`)
//! - [`peer`]: the [`PeerSession`] trait and the channel-backed [`Peer`] handle
//! - [`relay`]: inventory broadcast to every connected peer
//!
//! Socket I/O is not handled here. A connection writer owns the receiving
//! end of each [`Peer`]'s outbound queue and frames messages with
//! [`PeerMessage::encode`].

pub mod config;
pub mod peer;
pub mod protocol;
pub mod relay;

pub use config::NetworkConfig;
pub use peer::{KnownInventory, Peer, PeerId, PeerSession};
pub use protocol::{MsgGetBlocks, MsgGetData, MsgInv, PeerMessage};
pub use relay::{InventoryRelay, PeerSet};
