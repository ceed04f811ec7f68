//! Wire messages for block synchronization.
//!
//! All messages are serialized as network magic bytes + bincode payload.
//! Never JSON for consensus-adjacent data.

use tarn_core::constants::{
    MAX_BLOCK_LOCATOR_HASHES, MAX_BLOCK_SIZE, MAX_INV_PER_MSG, NetworkType,
};
use tarn_core::error::NetworkError;
use tarn_core::types::{Block, BlockLocator, Hash256, InvVect};

/// Maximum wire message size. Large enough for a full block or a
/// maximum-length inventory list.
pub const MAX_MESSAGE_SIZE: usize = 2 * MAX_BLOCK_SIZE;

const MAGIC_LEN: usize = 4;

/// Announcement of objects the sender has.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct MsgInv {
    pub inventory: Vec<InvVect>,
}

impl MsgInv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, refusing to grow past [`MAX_INV_PER_MSG`].
    pub fn add_inv_vect(&mut self, inv: InvVect) -> Result<(), NetworkError> {
        push_capped(&mut self.inventory, inv)
    }
}

/// Request for the full objects behind a list of inventory vectors.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct MsgGetData {
    pub inventory: Vec<InvVect>,
}

impl MsgGetData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, refusing to grow past [`MAX_INV_PER_MSG`].
    pub fn add_inv_vect(&mut self, inv: InvVect) -> Result<(), NetworkError> {
        push_capped(&mut self.inventory, inv)
    }
}

fn push_capped(list: &mut Vec<InvVect>, inv: InvVect) -> Result<(), NetworkError> {
    if list.len() >= MAX_INV_PER_MSG {
        return Err(NetworkError::TooManyInventory {
            count: list.len() + 1,
            max: MAX_INV_PER_MSG,
        });
    }
    list.push(inv);
    Ok(())
}

/// Request for inventory of the blocks following the first locator hash the
/// receiver recognizes, up to and including `hash_stop` (zero: no limit).
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct MsgGetBlocks {
    pub locator: BlockLocator,
    pub hash_stop: Hash256,
}

impl MsgGetBlocks {
    pub fn new(locator: BlockLocator, hash_stop: Hash256) -> Self {
        Self { locator, hash_stop }
    }
}

/// A message exchanged between Tarn peers during block synchronization.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub enum PeerMessage {
    Inv(MsgInv),
    GetData(MsgGetData),
    GetBlocks(MsgGetBlocks),
    Block(Block),
}

impl PeerMessage {
    /// Protocol command name, for logging.
    pub fn command(&self) -> &'static str {
        match self {
            PeerMessage::Inv(_) => "inv",
            PeerMessage::GetData(_) => "getdata",
            PeerMessage::GetBlocks(_) => "getblocks",
            PeerMessage::Block(_) => "block",
        }
    }

    /// Validate message constraints before encoding or after decoding.
    pub fn validate(&self) -> Result<(), NetworkError> {
        match self {
            PeerMessage::Inv(MsgInv { inventory })
            | PeerMessage::GetData(MsgGetData { inventory }) => {
                if inventory.len() > MAX_INV_PER_MSG {
                    return Err(NetworkError::TooManyInventory {
                        count: inventory.len(),
                        max: MAX_INV_PER_MSG,
                    });
                }
            }
            PeerMessage::GetBlocks(msg) => {
                if msg.locator.len() > MAX_BLOCK_LOCATOR_HASHES {
                    return Err(NetworkError::LocatorTooLarge {
                        size: msg.locator.len(),
                        max: MAX_BLOCK_LOCATOR_HASHES,
                    });
                }
            }
            PeerMessage::Block(_) => {}
        }
        Ok(())
    }

    /// Encode this message as magic bytes + bincode payload.
    pub fn encode(&self, network: NetworkType) -> Result<Vec<u8>, NetworkError> {
        self.validate()?;
        let payload = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| NetworkError::Encode(e.to_string()))?;
        let total_size = MAGIC_LEN + payload.len();
        if total_size > MAX_MESSAGE_SIZE {
            return Err(NetworkError::MessageTooLarge { size: total_size });
        }
        let mut buf = Vec::with_capacity(total_size);
        buf.extend_from_slice(&network.magic_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a message from magic bytes + bincode payload.
    ///
    /// Returns `None` if the magic bytes don't match `network`, the message
    /// is too large, deserialization fails, or validation fails.
    pub fn decode(data: &[u8], network: NetworkType) -> Option<Self> {
        if data.len() > MAX_MESSAGE_SIZE || data.len() < MAGIC_LEN {
            return None;
        }
        if data[..MAGIC_LEN] != network.magic_bytes() {
            return None;
        }
        let (msg, _): (Self, usize) =
            bincode::decode_from_slice(&data[MAGIC_LEN..], bincode::config::standard()).ok()?;
        msg.validate().ok()?;
        Some(msg)
    }
}
