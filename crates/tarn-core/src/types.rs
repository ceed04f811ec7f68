//! Core protocol types: hashes, blocks, inventory vectors.
//!
//! Block header hashes are double SHA-256 over a fixed byte layout;
//! transaction IDs are BLAKE3 over the canonical bincode encoding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::BitOr;

use crate::error::BlockError;

/// A 32-byte hash value.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Doubles as the "no stop hash" sentinel in getblocks.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A sparse list of block hashes, newest first, ending at genesis.
pub type BlockLocator = Vec<Hash256>;

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

/// A transaction input. Scripts are opaque to this crate.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub script: Vec<u8>,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    pub value: u64,
    pub pubkey_hash: Hash256,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub version: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, BlockError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| BlockError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }
}

/// Block header.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    pub version: u64,
    /// Hash of the previous block header.
    pub prev_hash: Hash256,
    /// BLAKE3 merkle root of the block's transactions.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    pub difficulty_target: u64,
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing (4 u64 fields + 2 * 32-byte hashes).
    const HASH_SIZE: usize = 4 * 8 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Fixed byte layout: version || prev_hash || merkle_root ||
    /// timestamp || difficulty_target || nonce, all little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.difficulty_target.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header plus transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: BlockHeader,
    /// Ordered list of transactions. First transaction must be coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the block header.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Get the coinbase transaction, if the block is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Number of transactions in the block.
    pub fn tx_count(&self) -> u64 {
        self.transactions.len() as u64
    }

    /// Size of the canonical bincode encoding.
    pub fn serialized_size(&self) -> Result<usize, BlockError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map(|bytes| bytes.len())
            .map_err(|e| BlockError::Serialization(e.to_string()))
    }
}

/// Kind of object an inventory vector refers to.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum InvType {
    Error,
    Tx,
    Block,
}

impl fmt::Display for InvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvType::Error => f.write_str("ERROR"),
            InvType::Tx => f.write_str("MSG_TX"),
            InvType::Block => f.write_str("MSG_BLOCK"),
        }
    }
}

/// A typed identifier advertised by a peer as available.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct InvVect {
    pub inv_type: InvType,
    pub hash: Hash256,
}

impl InvVect {
    pub fn new(inv_type: InvType, hash: Hash256) -> Self {
        Self { inv_type, hash }
    }

    /// Inventory vector for a block hash.
    pub fn block(hash: Hash256) -> Self {
        Self::new(InvType::Block, hash)
    }

    pub fn is_block(&self) -> bool {
        self.inv_type == InvType::Block
    }
}

impl fmt::Display for InvVect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.inv_type, self.hash)
    }
}

/// Services advertised by a peer during the handshake.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct ServiceFlags(pub u64);

impl ServiceFlags {
    /// No services.
    pub const NONE: Self = Self(0);
    /// The peer serves the full block chain.
    pub const NODE_NETWORK: Self = Self(1);

    /// Whether every flag in `other` is set.
    pub fn contains(&self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ServiceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                script: vec![0x01],
            }],
            outputs: vec![TxOutput {
                value: 50,
                pubkey_hash: Hash256([0xAA; 32]),
            }],
            lock_time: 0,
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: Hash256([0x11; 32]),
            timestamp: 1_700_000_000,
            difficulty_target: u64::MAX,
            nonce: 7,
        }
    }

    #[test]
    fn header_hash_is_deterministic() {
        let h = sample_header();
        assert_eq!(h.hash(), h.clone().hash());
    }

    #[test]
    fn header_hash_changes_with_nonce() {
        let a = sample_header();
        let mut b = sample_header();
        b.nonce += 1;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn block_hash_matches_header_hash() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase()],
        };
        assert_eq!(block.hash(), block.header.hash());
        assert_eq!(block.tx_count(), 1);
    }

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase().is_coinbase());
        let mut tx = sample_coinbase();
        tx.inputs[0].previous_output = OutPoint {
            txid: Hash256([1; 32]),
            index: 0,
        };
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn hash_display_is_lowercase_hex() {
        let h = Hash256([0xAB; 32]);
        assert_eq!(h.to_string(), "ab".repeat(32));
        assert_eq!(Hash256::from_hex(&h.to_string()), Some(h));
        assert_eq!(Hash256::from_hex("abcd"), None);
    }

    #[test]
    fn inv_vect_block_constructor() {
        let iv = InvVect::block(Hash256([3; 32]));
        assert!(iv.is_block());
        assert!(!InvVect::new(InvType::Tx, Hash256::ZERO).is_block());
        assert!(iv.to_string().starts_with("MSG_BLOCK "));
    }

    #[test]
    fn service_flags_contains() {
        let flags = ServiceFlags::NODE_NETWORK | ServiceFlags(0b100);
        assert!(flags.contains(ServiceFlags::NODE_NETWORK));
        assert!(!ServiceFlags::NONE.contains(ServiceFlags::NODE_NETWORK));
        assert!(ServiceFlags::NONE.contains(ServiceFlags::NONE));
    }

    #[test]
    fn txid_differs_per_lock_time() {
        let a = sample_coinbase();
        let mut b = sample_coinbase();
        b.lock_time = 1;
        assert_ne!(a.txid().unwrap(), b.txid().unwrap());
    }
}
