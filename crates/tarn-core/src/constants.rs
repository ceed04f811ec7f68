//! Protocol constants and network selection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Network selection.
///
/// Each network has its own magic bytes, genesis block and data directory.
///
/// # Examples
///
/// ```
/// use tarn_core::constants::NetworkType;
/// let net = NetworkType::default();
/// assert_eq!(net, NetworkType::Mainnet);
/// assert_eq!(net.magic_bytes(), *b"TARN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network. The block database is wiped on every start.
    Regtest,
}

impl NetworkType {
    /// Four-byte network identifier prepended to all P2P messages.
    ///
    /// # Examples
    ///
    /// ```
    /// use tarn_core::constants::NetworkType;
    /// assert_eq!(NetworkType::Testnet.magic_bytes(), *b"TTST");
    /// assert_eq!(NetworkType::Regtest.magic_bytes(), *b"TREG");
    /// ```
    pub fn magic_bytes(&self) -> [u8; 4] {
        match self {
            Self::Mainnet => [0x54, 0x41, 0x52, 0x4E], // "TARN"
            Self::Testnet => [0x54, 0x54, 0x53, 0x54], // "TTST"
            Self::Regtest => [0x54, 0x52, 0x45, 0x47], // "TREG"
        }
    }

    /// Default TCP port for P2P connections.
    pub fn default_p2p_port(&self) -> u16 {
        match self {
            Self::Mainnet => 8733,
            Self::Testnet => 18733,
            Self::Regtest => 28733,
        }
    }

    /// Subdirectory name appended to the base data directory path.
    ///
    /// # Examples
    ///
    /// ```
    /// use tarn_core::constants::NetworkType;
    /// assert_eq!(NetworkType::Regtest.data_dir_suffix(), "regtest");
    /// ```
    pub fn data_dir_suffix(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }

    /// Whether the block database must be wiped before every run.
    pub fn is_regression_test(&self) -> bool {
        matches!(self, Self::Regtest)
    }
}

impl std::str::FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Capacity of the block, inventory and chain-notification queues.
pub const CHAN_BUFFER_SIZE: usize = 50;

/// Maximum number of inventory vectors in a single inv or getdata message.
pub const MAX_INV_PER_MSG: usize = 50_000;

/// Maximum number of hashes in a block locator.
pub const MAX_BLOCK_LOCATOR_HASHES: usize = 500;

/// Maximum serialized block size in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_048_576;

/// Maximum number of orphan blocks held while waiting for their parents.
pub const MAX_ORPHAN_BLOCKS: usize = 100;

/// Number of inventory vectors remembered per peer for relay de-duplication.
pub const MAX_KNOWN_INVENTORY: usize = 1000;

/// Default maximum number of connected peers.
pub const DEFAULT_MAX_PEERS: usize = 125;

/// Minimum interval between two block progress log lines.
pub const BLOCK_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Prefix of the block database directory name. The database type is appended.
pub const BLOCK_DB_NAME_PREFIX: &str = "blocks";
