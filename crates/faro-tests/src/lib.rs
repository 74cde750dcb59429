//! Faro Tests - integration test harness.
//!
//! Spins up a naming server and any number of storage servers in-process,
//! on ephemeral ports over real TCP, so end-to-end tests can drive the
//! public RPC surfaces exactly as clients do.

#![deny(unsafe_code)]

pub mod cluster;

pub use cluster::{StorageNode, TestCluster};
