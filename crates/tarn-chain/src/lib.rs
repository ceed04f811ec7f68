//! Reference chain engine for Tarn.
//!
//! [`BlockChain`] implements [`tarn_core::traits::ChainEngine`] over any
//! [`tarn_core::traits::BlockStore`]. It keeps an in-memory block index for
//! the main chain and every side chain, an orphan pool for blocks whose
//! parent has not arrived yet, and reorganizes onto the longest chain.
//! Events are pushed to the block manager through a bounded channel.

pub mod chain;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chain::BlockChain;
