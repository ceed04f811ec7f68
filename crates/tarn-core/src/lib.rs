//! # tarn-core
//! Foundation types and collaborator traits for the Tarn block
//! synchronization core.

pub mod constants;
pub mod error;
pub mod genesis;
pub mod merkle;
pub mod store;
pub mod traits;
pub mod types;
