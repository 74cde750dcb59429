//! Faro Core - Core types and primitives for the faro distributed filesystem.
//!
//! This crate provides:
//! - The [`Path`] value type used by every filesystem interface
//! - Wire encoding for deterministic serialization
//! - Well-known port constants for the four RPC endpoints

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod path;
pub mod wire;

pub use path::{Path, PathError};
pub use wire::{WireDecode, WireEncode, WireError};

/// Well-known port for the naming server's client-facing service endpoint.
pub const SERVICE_PORT: u16 = 6000;
/// Well-known port for the naming server's registration endpoint.
pub const REGISTRATION_PORT: u16 = 6001;
/// Well-known port for a storage server's client-facing data endpoint.
pub const STORAGE_PORT: u16 = 7000;
/// Well-known port for a storage server's naming-facing command endpoint.
pub const COMMAND_PORT: u16 = 7001;

/// Maximum encoded frame size accepted on any endpoint.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
