//! Node configuration for the Tarn full node.
//!
//! [`NodeConfig`] has usable defaults for every field. It can be loaded
//! from a TOML file, with `TARN_*` environment variables taking precedence
//! (e.g. `TARN_MAX_PEERS=8`, `TARN_NETWORK_TYPE=regtest`).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tarn_core::constants::{BLOCK_DB_NAME_PREFIX, DEFAULT_MAX_PEERS, NetworkType};
use tarn_core::error::TarnError;
use tarn_network::NetworkConfig;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "TARN";

/// Block database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// Persistent RocksDB database under the data directory.
    #[default]
    Rocksdb,
    /// In-memory store; nothing is written to disk.
    Memdb,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::Rocksdb => f.write_str("rocksdb"),
            DbType::Memdb => f.write_str("memdb"),
        }
    }
}

impl std::str::FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rocksdb" => Ok(Self::Rocksdb),
            "memdb" => Ok(Self::Memdb),
            other => Err(format!("unknown database type: {other}")),
        }
    }
}

/// Configuration for a full node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network to join.
    pub network_type: NetworkType,
    /// Root directory for all persistent data. A per-network subdirectory
    /// is created beneath it.
    pub data_dir: PathBuf,
    /// Block database backend.
    pub db_type: DbType,
    /// Maximum number of connected peers. Sizes the candidate queues.
    pub max_peers: usize,
    /// Log level filter string (e.g. "info", "debug", "tarn_node_lib=trace").
    pub log_level: String,
    /// Log output format: "text" or "json".
    pub log_format: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tarn");

        Self {
            network_type: NetworkType::Mainnet,
            data_dir,
            db_type: DbType::Rocksdb,
            max_peers: DEFAULT_MAX_PEERS,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from an optional TOML file plus `TARN_*`
    /// environment overrides. Missing fields keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, TarnError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|settings| settings.try_deserialize::<NodeConfig>())
            .map_err(|e| TarnError::Config(e.to_string()))
    }

    /// Data directory for the configured network.
    pub fn network_data_dir(&self) -> PathBuf {
        self.data_dir.join(self.network_type.data_dir_suffix())
    }

    /// Path of the block database: `<network data dir>/blocks_<db_type>`.
    pub fn block_db_path(&self) -> PathBuf {
        self.network_data_dir()
            .join(format!("{BLOCK_DB_NAME_PREFIX}_{}", self.db_type))
    }

    /// Peer-session settings derived from this configuration.
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            max_peers: self.max_peers,
            ..NetworkConfig::for_network(self.network_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_log_level_is_info() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.log_format, "text");
    }

    #[test]
    fn default_data_dir_ends_with_tarn() {
        let cfg = NodeConfig::default();
        assert!(
            cfg.data_dir.ends_with("tarn"),
            "data_dir should end with 'tarn': {:?}",
            cfg.data_dir
        );
    }

    #[test]
    fn block_db_path_includes_network_and_db_type() {
        let cfg = NodeConfig {
            data_dir: PathBuf::from("/tmp/tarn-test"),
            network_type: NetworkType::Regtest,
            ..NodeConfig::default()
        };
        assert_eq!(
            cfg.block_db_path(),
            PathBuf::from("/tmp/tarn-test/regtest/blocks_rocksdb")
        );
    }

    #[test]
    fn db_type_parses_and_displays() {
        assert_eq!("memdb".parse::<DbType>(), Ok(DbType::Memdb));
        assert_eq!("RocksDB".parse::<DbType>(), Ok(DbType::Rocksdb));
        assert!("leveldb".parse::<DbType>().is_err());
        assert_eq!(DbType::Memdb.to_string(), "memdb");
    }

    #[test]
    fn network_config_carries_max_peers() {
        let cfg = NodeConfig {
            max_peers: 9,
            network_type: NetworkType::Testnet,
            ..NodeConfig::default()
        };
        let net = cfg.network_config();
        assert_eq!(net.max_peers, 9);
        assert_eq!(net.network, NetworkType::Testnet);
    }

    #[test]
    fn load_reads_toml_file_and_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "network_type = \"regtest\"\nmax_peers = 4\ndb_type = \"memdb\""
        )
        .unwrap();

        let cfg = NodeConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.network_type, NetworkType::Regtest);
        assert_eq!(cfg.max_peers, 4);
        assert_eq!(cfg.db_type, DbType::Memdb);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, TarnError::Config(_)));
    }

    #[test]
    fn load_rejects_unknown_network() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "network_type = \"moonnet\"").unwrap();
        assert!(NodeConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn config_is_clone_and_debug() {
        let cfg = NodeConfig::default();
        let cfg2 = cfg.clone();
        let debug = format!("{cfg2:?}");
        assert!(debug.contains("NodeConfig"));
    }
}
