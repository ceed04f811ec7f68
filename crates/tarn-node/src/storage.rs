//! RocksDB-backed block storage.
//!
//! Implements [`BlockStore`] using column families for block bodies, the
//! main-chain height index, the reverse hash→height index, and metadata.
//! All mutations use atomic [`WriteBatch`] for crash safety.
//!
//! Block bodies are never deleted: a block disconnected during a reorg
//! stays readable by hash.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};

use tarn_core::error::{ChainError, TarnError};
use tarn_core::traits::BlockStore;
use tarn_core::types::{Block, Hash256};

// --- Column family names ---

const CF_BLOCKS: &str = "blocks";
const CF_HEIGHT_INDEX: &str = "height_index";
const CF_BLOCK_HEIGHTS: &str = "block_heights";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_BLOCKS, CF_HEIGHT_INDEX, CF_BLOCK_HEIGHTS, CF_METADATA];

// --- Metadata keys ---

const META_TIP_HEIGHT: &[u8] = b"tip_height";
const META_TIP_HASH: &[u8] = b"tip_hash";

fn storage_err(e: impl std::fmt::Display) -> TarnError {
    TarnError::Storage(e.to_string())
}

/// RocksDB-backed main-chain storage.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open an existing database. Fails if nothing exists at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TarnError> {
        Self::open_with(path.as_ref(), false)
    }

    /// Create a database at `path`, or open it if it already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TarnError> {
        Self::open_with(path.as_ref(), true)
    }

    fn open_with(path: &Path, create: bool) -> Result<Self, TarnError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(create);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors).map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), TarnError> {
        self.db.flush().map_err(storage_err)
    }

    // --- Internal helpers ---

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, TarnError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| TarnError::Storage(format!("missing column family: {name}")))
    }

    fn get_meta_u64(&self, key: &[u8]) -> Result<u64, TarnError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    /// Encode a height as big-endian bytes for ordered iteration.
    fn height_key(height: u64) -> [u8; 8] {
        height.to_be_bytes()
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64, TarnError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TarnError::Storage("invalid u64 value length".into()))?;
    Ok(u64::from_le_bytes(arr))
}

fn decode_hash(bytes: &[u8]) -> Result<Hash256, TarnError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| TarnError::Storage("invalid hash length".into()))?;
    Ok(Hash256(arr))
}

impl BlockStore for RocksStore {
    fn chain_tip(&self) -> Result<(u64, Hash256), TarnError> {
        let cf = self.cf_handle(CF_METADATA)?;
        let hash = match self.db.get_cf(cf, META_TIP_HASH).map_err(storage_err)? {
            Some(bytes) => decode_hash(&bytes)?,
            None => return Ok((0, Hash256::ZERO)),
        };
        if hash.is_zero() {
            return Ok((0, Hash256::ZERO));
        }
        let height = self.get_meta_u64(META_TIP_HEIGHT)?;
        Ok((height, hash))
    }

    fn connect_block(&self, block: &Block, height: u64) -> Result<(), TarnError> {
        let (tip_height, tip_hash) = self.chain_tip()?;
        let expected = if tip_hash.is_zero() { 0 } else { tip_height + 1 };
        if height != expected {
            return Err(ChainError::HeightMismatch {
                expected,
                got: height,
            }
            .into());
        }

        let hash = block.hash();
        let body = bincode::encode_to_vec(block, bincode::config::standard()).map_err(storage_err)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf_handle(CF_BLOCKS)?, hash.as_bytes(), &body);
        batch.put_cf(
            self.cf_handle(CF_HEIGHT_INDEX)?,
            Self::height_key(height),
            hash.as_bytes(),
        );
        batch.put_cf(
            self.cf_handle(CF_BLOCK_HEIGHTS)?,
            hash.as_bytes(),
            height.to_le_bytes(),
        );
        let cf_meta = self.cf_handle(CF_METADATA)?;
        batch.put_cf(cf_meta, META_TIP_HASH, hash.as_bytes());
        batch.put_cf(cf_meta, META_TIP_HEIGHT, height.to_le_bytes());

        self.db.write(batch).map_err(storage_err)
    }

    fn disconnect_tip(&self) -> Result<Hash256, TarnError> {
        let (tip_height, tip_hash) = self.chain_tip()?;
        if tip_hash.is_zero() {
            return Err(ChainError::EmptyChain.into());
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf_handle(CF_HEIGHT_INDEX)?, Self::height_key(tip_height));
        batch.delete_cf(self.cf_handle(CF_BLOCK_HEIGHTS)?, tip_hash.as_bytes());

        let cf_meta = self.cf_handle(CF_METADATA)?;
        if tip_height == 0 {
            batch.put_cf(cf_meta, META_TIP_HASH, Hash256::ZERO.as_bytes());
            batch.put_cf(cf_meta, META_TIP_HEIGHT, 0u64.to_le_bytes());
        } else {
            let new_height = tip_height - 1;
            let new_tip = self
                .get_block_hash(new_height)?
                .ok_or_else(|| ChainError::BlockNotFound(format!("height {new_height}")))?;
            batch.put_cf(cf_meta, META_TIP_HASH, new_tip.as_bytes());
            batch.put_cf(cf_meta, META_TIP_HEIGHT, new_height.to_le_bytes());
        }

        self.db.write(batch).map_err(storage_err)?;
        Ok(tip_hash)
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, TarnError> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        match self.db.get_cf(cf, hash.as_bytes()).map_err(storage_err)? {
            Some(data) => {
                let (block, _): (Block, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(storage_err)?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, TarnError> {
        let cf = self.cf_handle(CF_HEIGHT_INDEX)?;
        self.db
            .get_cf(cf, Self::height_key(height))
            .map_err(storage_err)?
            .map(|bytes| decode_hash(&bytes))
            .transpose()
    }

    fn get_height(&self, hash: &Hash256) -> Result<Option<u64>, TarnError> {
        let cf = self.cf_handle(CF_BLOCK_HEIGHTS)?;
        self.db
            .get_cf(cf, hash.as_bytes())
            .map_err(storage_err)?
            .map(|bytes| decode_u64(&bytes))
            .transpose()
    }

    /// Sync the write-ahead log to disk.
    fn sync(&self) -> Result<(), TarnError> {
        self.db.flush_wal(true).map_err(storage_err)
    }
}
