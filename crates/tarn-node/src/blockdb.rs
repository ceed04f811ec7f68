//! Opening the block database at startup.
//!
//! [`load_block_db`] resolves `<data dir>/<network>/blocks_<db_type>`, wipes
//! it first in regtest mode, opens it (creating the data directory and the
//! database when missing) and makes sure the genesis block is stored.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use tarn_core::error::TarnError;
use tarn_core::genesis::genesis_block;
use tarn_core::store::MemoryBlockStore;
use tarn_core::traits::BlockStore;

use crate::config::{DbType, NodeConfig};
use crate::storage::RocksStore;

/// Remove a regression-test block database, whether it is a file or a
/// directory. A missing path is not an error.
pub fn remove_regression_db(path: &Path) -> Result<(), TarnError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    info!("removing regression test block database from {}", path.display());
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn open_rocks(config: &NodeConfig) -> Result<RocksStore, TarnError> {
    let path = config.block_db_path();
    if config.network_type.is_regression_test() {
        remove_regression_db(&path)?;
    }

    info!("loading block database from {}", path.display());
    if path.exists() {
        return RocksStore::open(&path);
    }
    fs::create_dir_all(config.network_data_dir())?;
    RocksStore::create(&path)
}

/// Open the configured block database and insert the genesis block if the
/// database is empty.
pub fn load_block_db(config: &NodeConfig) -> Result<Arc<dyn BlockStore>, TarnError> {
    let store: Arc<dyn BlockStore> = match config.db_type {
        DbType::Rocksdb => Arc::new(open_rocks(config)?),
        DbType::Memdb => {
            info!("using in-memory block database");
            Arc::new(MemoryBlockStore::new())
        }
    };

    if store.is_empty() {
        let genesis = genesis_block(config.network_type);
        store.connect_block(genesis, 0)?;
        info!(hash = %genesis.hash(), "inserted genesis block");
    }

    let (height, _) = store.chain_tip()?;
    info!(height, "block database loaded");
    Ok(store)
}
