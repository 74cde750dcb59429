//! Faro Storage - the storage server.
//!
//! Storage servers respond to client file access requests. The files
//! accessible through a storage server are those under a given directory of
//! the local filesystem; the logical path `/a/b/c` lives at `<root>/a/b/c`.
//! There are no metadata sidecar files, the local tree is the state.
//!
//! On startup the server scans its root, registers the inventory with the
//! naming server, deletes whatever the naming server asks it to drop, and
//! prunes directories the deletions left empty.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod engine;
pub mod scan;
pub mod server;

pub use engine::StorageEngine;
pub use scan::{prune_empty_dirs, scan_files};
pub use server::{StorageConfig, StorageServer};

use std::path::PathBuf;

use faro_core::Path;
use faro_net::RpcError;
use faro_proto::{ErrorCode, Payload};
use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The path does not name a local file
    #[error("path not found: {0}")]
    NotFound(Path),

    /// Read range exceeds the file bounds
    #[error("range {offset}+{length} exceeds file size {size}")]
    OutOfBounds {
        /// Requested start offset
        offset: u64,
        /// Requested length
        length: u64,
        /// Actual file size
        size: u64,
    },

    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured root does not exist or is not a directory
    #[error("storage root {0:?} is not a directory")]
    BadRoot(PathBuf),

    /// The server is already running
    #[error("storage server is already running")]
    AlreadyRunning,

    /// The server was stopped and cannot be restarted
    #[error("storage server cannot be restarted")]
    NotRestartable,

    /// Registration with the naming server failed
    #[error("registration failed: {0}")]
    Rpc(#[from] RpcError),
}

impl StorageError {
    /// Maps the error onto its wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            StorageError::NotFound(_) => ErrorCode::NotFound,
            StorageError::OutOfBounds { .. } => ErrorCode::IndexOutOfBounds,
            StorageError::Io(_) | StorageError::Rpc(_) => ErrorCode::Io,
            StorageError::BadRoot(_)
            | StorageError::AlreadyRunning
            | StorageError::NotRestartable => ErrorCode::IllegalState,
        }
    }

    /// Converts the error into a wire error payload.
    pub fn to_payload(&self) -> Payload {
        Payload::error(self.code(), self.to_string())
    }
}
