//! Tarn full node binary.
//!
//! Opens the block database, builds the chain engine and runs the block
//! manager until Ctrl+C. Peer connections hand their sessions to the
//! manager through its queue API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use tarn_chain::BlockChain;
use tarn_core::constants::NetworkType;
use tarn_core::traits::BlockStore;
use tarn_network::PeerSet;
use tarn_node_lib::{BlockManager, DbType, NodeConfig, load_block_db};

/// Tarn full node.
#[derive(Parser, Debug)]
#[command(name = "tarn-node", version, about = "Tarn full node block manager")]
struct Args {
    /// TOML configuration file. `TARN_*` environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for blockchain storage
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Block database backend ("rocksdb" or "memdb")
    #[arg(long)]
    db_type: Option<DbType>,

    /// Maximum number of connected peers
    #[arg(long)]
    max_peers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,

    /// Use the public test network.
    #[arg(long, conflicts_with = "regtest")]
    testnet: bool,

    /// Run in local regression-test mode. The block database is wiped on
    /// every start.
    #[arg(long, conflicts_with = "testnet")]
    regtest: bool,
}

impl Args {
    /// Layer CLI flags over the file/environment configuration.
    fn into_config(self) -> Result<NodeConfig> {
        let mut config =
            NodeConfig::load(self.config.as_deref()).context("failed to load configuration")?;

        if self.regtest {
            config.network_type = NetworkType::Regtest;
        } else if self.testnet {
            config.network_type = NetworkType::Testnet;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(db_type) = self.db_type {
            config.db_type = db_type;
        }
        if let Some(max_peers) = self.max_peers {
            config.max_peers = max_peers;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config.log_level, &config.log_format);

    info!("Tarn node v{}", env!("CARGO_PKG_VERSION"));
    info!("network: {:?}", config.network_type);
    info!("data_dir: {:?}", config.data_dir);
    info!("db_type: {}", config.db_type);

    let store = load_block_db(&config).context("failed to load block database")?;

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let chain = Arc::new(
        BlockChain::new(config.network_type, store.clone(), notify_tx)
            .context("failed to initialize chain")?,
    );
    info!(height = chain.best_height(), hash = %chain.best_hash(), "chain tip");

    let peers = Arc::new(PeerSet::new());
    let manager = BlockManager::new(chain, store.clone(), peers, notify_rx, config.max_peers);
    manager.start();

    info!("Tarn node running (Ctrl+C to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("received Ctrl+C, shutting down...");

    manager.stop().await.context("block manager did not stop cleanly")?;
    store.sync().context("failed to sync block database")?;
    info!("Tarn node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regtest_flag_overrides_network() {
        let args = Args::parse_from(["tarn-node", "--regtest", "--db-type", "memdb"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.network_type, NetworkType::Regtest);
        assert_eq!(config.db_type, DbType::Memdb);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "tarn-node",
            "--data-dir",
            "/tmp/tarn-test",
            "--max-peers",
            "4",
            "--log-format",
            "json",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/tarn-test"));
        assert_eq!(config.max_peers, 4);
        assert_eq!(config.log_format, "json");
        assert_eq!(config.network_type, NetworkType::Mainnet);
    }

    #[test]
    fn testnet_and_regtest_conflict() {
        assert!(Args::try_parse_from(["tarn-node", "--testnet", "--regtest"]).is_err());
    }
}
