//! End-to-end test suite for Tarn.
//!
//! Each test runs a [`BlockManager`](tarn_node_lib::BlockManager) over an
//! in-memory chain with channel-backed peers and observes only what the
//! peers and the relay receive.

pub mod helpers;
