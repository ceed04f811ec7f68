//! # tarn-node: the block manager and its persistence.
//!
//! - [`manager::BlockManager`]: lifecycle and public submission API
//! - [`sync::SyncCoordinator`]: sync-peer selection
//! - [`ingest::BlockHandler`]: block ingest and inventory reconciliation
//! - [`notify::NotificationDispatcher`]: reactions to chain events
//! - [`storage::RocksStore`] and [`blockdb::load_block_db`]: the block database
//! - [`config::NodeConfig`]: node configuration

pub mod blockdb;
pub mod config;
pub mod ingest;
pub mod manager;
pub mod notify;
pub mod origins;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use blockdb::load_block_db;
pub use config::{DbType, NodeConfig};
pub use manager::BlockManager;
pub use storage::RocksStore;
