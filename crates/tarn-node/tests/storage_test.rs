//! Block database persistence through RocksDB and `load_block_db`.

use std::sync::Arc;

use tokio::sync::mpsc;

use tarn_chain::BlockChain;
use tarn_chain::testing::{build_chain, child_block};
use tarn_core::constants::NetworkType;
use tarn_core::genesis::{genesis_block, genesis_hash};
use tarn_core::traits::{BlockStore, ChainEngine};
use tarn_node_lib::config::{DbType, NodeConfig};
use tarn_node_lib::load_block_db;
use tarn_node_lib::storage::RocksStore;

fn config_in(dir: &tempfile::TempDir, network_type: NetworkType) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().to_path_buf(),
        network_type,
        db_type: DbType::Rocksdb,
        ..NodeConfig::default()
    }
}

#[test]
fn blocks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chaindata");
    let genesis = genesis_block(NetworkType::Mainnet);
    let blocks = build_chain(genesis, 3, 0);

    {
        let store = RocksStore::create(&path).unwrap();
        store.connect_block(genesis, 0).unwrap();
        for (i, block) in blocks.iter().enumerate() {
            store.connect_block(block, i as u64 + 1).unwrap();
        }
        store.flush().unwrap();
    }

    let store = RocksStore::open(&path).unwrap();
    assert_eq!(store.chain_tip().unwrap(), (3, blocks[2].hash()));
    assert_eq!(store.get_block_hash(1).unwrap(), Some(blocks[0].hash()));
    assert_eq!(store.get_height(&blocks[1].hash()).unwrap(), Some(2));
    assert_eq!(store.get_block(&blocks[2].hash()).unwrap().as_ref(), Some(&blocks[2]));
}

#[test]
fn load_creates_directory_and_inserts_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir, NetworkType::Testnet);
    assert!(!config.network_data_dir().exists());

    let store = load_block_db(&config).unwrap();
    assert!(config.block_db_path().exists());
    assert_eq!(
        store.chain_tip().unwrap(),
        (0, genesis_hash(NetworkType::Testnet))
    );
}

#[test]
fn load_reopens_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir, NetworkType::Mainnet);
    let block = child_block(genesis_block(NetworkType::Mainnet), 1);

    {
        let store = load_block_db(&config).unwrap();
        store.connect_block(&block, 1).unwrap();
        store.sync().unwrap();
    }

    let store = load_block_db(&config).unwrap();
    assert_eq!(store.chain_tip().unwrap(), (1, block.hash()));
}

#[test]
fn regtest_database_is_wiped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir, NetworkType::Regtest);
    let block = child_block(genesis_block(NetworkType::Regtest), 1);

    {
        let store = load_block_db(&config).unwrap();
        store.connect_block(&block, 1).unwrap();
        store.sync().unwrap();
    }

    let store = load_block_db(&config).unwrap();
    assert_eq!(
        store.chain_tip().unwrap(),
        (0, genesis_hash(NetworkType::Regtest))
    );
    assert_eq!(store.get_height(&block.hash()).unwrap(), None);
}

#[test]
fn regtest_wipe_removes_stray_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir, NetworkType::Regtest);
    std::fs::create_dir_all(config.network_data_dir()).unwrap();
    std::fs::write(config.block_db_path(), b"not a database").unwrap();

    let store = load_block_db(&config).unwrap();
    assert_eq!(store.chain_tip().unwrap().0, 0);
}

#[test]
fn chain_engine_reorg_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir, NetworkType::Mainnet);
    let genesis = genesis_block(NetworkType::Mainnet);
    let short = build_chain(genesis, 2, 1);
    let long = build_chain(genesis, 3, 2);

    {
        let store = load_block_db(&config).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let chain = BlockChain::new(NetworkType::Mainnet, Arc::clone(&store), tx).unwrap();
        for block in short.iter().chain(long.iter()) {
            chain.process_block(block).unwrap();
        }
        assert_eq!(chain.best_hash(), long[2].hash());
        store.sync().unwrap();
    }

    let store = load_block_db(&config).unwrap();
    assert_eq!(store.chain_tip().unwrap(), (3, long[2].hash()));
    assert_eq!(store.get_block_hash(1).unwrap(), Some(long[0].hash()));
    assert_eq!(store.get_height(&short[1].hash()).unwrap(), None);

    // The rebuilt index picks up where the reorg left off.
    let (tx, _rx) = mpsc::unbounded_channel();
    let chain = BlockChain::new(NetworkType::Mainnet, store, tx).unwrap();
    assert_eq!(chain.best_height(), 3);
}
