//! Genesis blocks for each network.
//!
//! Every node computes identical genesis blocks from hardcoded data. The
//! networks differ only in timestamp and coinbase message, which is enough
//! to give each one a distinct genesis hash.

use std::sync::LazyLock;

use crate::constants::NetworkType;
use crate::merkle;
use crate::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput};

/// Mainnet genesis timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_767_225_600;

const MAINNET_MESSAGE: &[u8] = b"Still water runs deep. Tarn genesis 2026.";
const TESTNET_MESSAGE: &[u8] = b"Tarn testnet genesis";
const REGTEST_MESSAGE: &[u8] = b"Tarn regtest genesis";

struct GenesisData {
    block: Block,
    hash: Hash256,
}

static MAINNET: LazyLock<GenesisData> =
    LazyLock::new(|| build_genesis(MAINNET_MESSAGE, GENESIS_TIMESTAMP));
static TESTNET: LazyLock<GenesisData> =
    LazyLock::new(|| build_genesis(TESTNET_MESSAGE, GENESIS_TIMESTAMP + 1));
static REGTEST: LazyLock<GenesisData> =
    LazyLock::new(|| build_genesis(REGTEST_MESSAGE, GENESIS_TIMESTAMP + 2));

fn build_genesis(message: &[u8], timestamp: u64) -> GenesisData {
    let coinbase = Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            script: message.to_vec(),
        }],
        outputs: vec![TxOutput {
            value: 0,
            pubkey_hash: Hash256::ZERO,
        }],
        lock_time: 0,
    };
    // Hardcoded coinbase: serialization cannot fail.
    let txid = coinbase
        .txid()
        .expect("genesis coinbase is hardcoded valid data");

    let block = Block {
        header: BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: merkle::merkle_root(&[txid]),
            timestamp,
            difficulty_target: u64::MAX,
            nonce: 0,
        },
        transactions: vec![coinbase],
    };
    let hash = block.hash();
    GenesisData { block, hash }
}

fn data(network: NetworkType) -> &'static GenesisData {
    match network {
        NetworkType::Mainnet => &MAINNET,
        NetworkType::Testnet => &TESTNET,
        NetworkType::Regtest => &REGTEST,
    }
}

/// The genesis block of `network`.
pub fn genesis_block(network: NetworkType) -> &'static Block {
    &data(network).block
}

/// The genesis block hash of `network`.
pub fn genesis_hash(network: NetworkType) -> Hash256 {
    data(network).hash
}
