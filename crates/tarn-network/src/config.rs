//! Network configuration for peer sessions.

use tarn_core::constants::{DEFAULT_MAX_PEERS, MAX_KNOWN_INVENTORY, NetworkType};

/// Configuration shared by every peer session.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network whose magic bytes prefix every wire message.
    pub network: NetworkType,
    /// Maximum number of connected peers.
    pub max_peers: usize,
    /// Per-peer capacity of the known-inventory cache.
    pub known_inventory_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::Mainnet,
            max_peers: DEFAULT_MAX_PEERS,
            known_inventory_capacity: MAX_KNOWN_INVENTORY,
        }
    }
}

impl NetworkConfig {
    /// Configuration preset for a network, other fields at their defaults.
    pub fn for_network(network: NetworkType) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Configuration preset for regression tests: a handful of peers.
    pub fn regtest() -> Self {
        Self {
            network: NetworkType::Regtest,
            max_peers: 8,
            ..Self::default()
        }
    }
}
