//! Error types for the Tarn block synchronization core.
use thiserror::Error;

/// Reasons the chain engine rejects a block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("block has no transactions")] NoTransactions,
    #[error("first transaction is not coinbase")] FirstTxNotCoinbase,
    #[error("multiple coinbase transactions")] MultipleCoinbase,
    #[error("duplicate transaction {0}")] DuplicateTransaction(String),
    #[error("invalid merkle root")] InvalidMerkleRoot,
    #[error("oversized: {size} > {max}")] OversizedBlock { size: usize, max: usize },
    #[error("already have block {0}")] DuplicateBlock(String),
    #[error("already have orphan {0}")] DuplicateOrphan(String),
    #[error("serialization: {0}")] Serialization(String),
}

/// Failures looking up chain positions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("empty chain: no blocks connected")] EmptyChain,
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
    #[error("genesis mismatch: store has {stored}, network expects {expected}")] GenesisMismatch { stored: String, expected: String },
}

/// Failures talking to a peer session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("peer disconnected: {0}")] PeerDisconnected(String),
    #[error("message too large: {size}")] MessageTooLarge { size: usize },
    #[error("too many inventory vectors: {count} > {max}")] TooManyInventory { count: usize, max: usize },
    #[error("locator too large: {size} > {max}")] LocatorTooLarge { size: usize, max: usize },
    #[error("encode: {0}")] Encode(String),
}

#[derive(Error, Debug)]
pub enum TarnError {
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Chain(#[from] ChainError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error(transparent)] Io(#[from] std::io::Error),
    #[error("storage: {0}")] Storage(String),
    #[error("config: {0}")] Config(String),
    #[error("shutdown: {0}")] Shutdown(String),
}

impl TarnError {
    /// Whether this error is a validation rejection of a peer-supplied block.
    pub fn is_rejection(&self) -> bool {
        matches!(self, TarnError::Block(_))
    }
}
