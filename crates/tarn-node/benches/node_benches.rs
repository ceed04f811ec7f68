//! Criterion benchmarks for tarn-node.
//!
//! Covers: RocksDB connect_block and block lookup, and inventory
//! reconciliation of a full-size announcement.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;
use tokio::sync::mpsc;

use tarn_chain::BlockChain;
use tarn_chain::testing::{build_chain, child_block};
use tarn_core::constants::{MAX_INV_PER_MSG, NetworkType};
use tarn_core::genesis::genesis_block;
use tarn_core::store::MemoryBlockStore;
use tarn_core::traits::BlockStore;
use tarn_core::types::{Hash256, InvVect, ServiceFlags};
use tarn_network::{MsgInv, NetworkConfig, Peer, PeerId, PeerSession};
use tarn_node_lib::ingest::BlockHandler;
use tarn_node_lib::origins::BlockOrigins;
use tarn_node_lib::storage::RocksStore;

const NET: NetworkType = NetworkType::Regtest;

fn store_with_genesis(dir: &TempDir) -> RocksStore {
    let store = RocksStore::create(dir.path()).unwrap();
    store.connect_block(genesis_block(NET), 0).unwrap();
    store
}

fn bench_connect_block(c: &mut Criterion) {
    let block = child_block(genesis_block(NET), 1);
    c.bench_function("connect_block", |b| {
        b.iter_with_setup(
            || {
                let dir = TempDir::new().unwrap();
                let store = store_with_genesis(&dir);
                (dir, store)
            },
            |(_dir, store)| {
                store.connect_block(black_box(&block), 1).unwrap();
            },
        )
    });
}

fn bench_block_lookup(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = store_with_genesis(&dir);
    let blocks = build_chain(genesis_block(NET), 100, 0);
    for (i, block) in blocks.iter().enumerate() {
        store.connect_block(block, i as u64 + 1).unwrap();
    }
    let hit = blocks[50].hash();
    let miss = Hash256([0xFF; 32]);

    c.bench_function("get_block", |b| b.iter(|| store.get_block(black_box(&hit))));
    c.bench_function("get_block_miss", |b| {
        b.iter(|| store.get_block(black_box(&miss)))
    });
    c.bench_function("get_block_hash", |b| {
        b.iter(|| store.get_block_hash(black_box(75)))
    });
}

fn bench_handle_inv(c: &mut Criterion) {
    let store = Arc::new(MemoryBlockStore::new());
    store.connect_block(genesis_block(NET), 0).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let chain = Arc::new(BlockChain::new(NET, store.clone(), tx).unwrap());
    let handler = BlockHandler::new(chain, store, Arc::new(BlockOrigins::new()));

    let inventory: Vec<InvVect> = (0..MAX_INV_PER_MSG as u32)
        .map(|i| {
            let mut bytes = [0u8; 32];
            bytes[..4].copy_from_slice(&i.to_le_bytes());
            bytes[31] = 0xAB;
            InvVect::block(Hash256(bytes))
        })
        .collect();
    let inv = MsgInv { inventory };

    c.bench_function("handle_inv_unknown_blocks", |b| {
        b.iter_with_setup(
            || {
                let (peer, rx) = Peer::new(
                    PeerId(1),
                    "127.0.0.1:30001".parse().unwrap(),
                    ServiceFlags::NODE_NETWORK,
                    0,
                    &NetworkConfig::regtest(),
                );
                let peer: Arc<dyn PeerSession> = peer;
                (peer, rx)
            },
            |(peer, _rx)| handler.handle_inv(black_box(&inv), &peer),
        )
    });
}

criterion_group!(benches, bench_connect_block, bench_block_lookup, bench_handle_inv);
criterion_main!(benches);
