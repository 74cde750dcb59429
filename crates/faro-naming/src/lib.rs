//! Faro Naming - the naming server.
//!
//! Each instance of the filesystem is centered on a single naming server. The
//! naming server maintains the directory tree; it stores no file data. Its
//! primary purpose is to map each path to the storage servers hosting the
//! file's contents.
//!
//! The server exposes two endpoints: the service surface used by clients for
//! directory operations, and the registration surface used by storage servers
//! to announce themselves and reconcile their file inventories.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod placement;
pub mod server;
pub mod tree;

pub use placement::{choose_server, StorageRegistration};
pub use server::{NamingConfig, NamingServer};
pub use tree::{EntryKind, Namespace, StubSet};

use faro_core::{Path, PathError};
use faro_net::RpcError;
use faro_proto::{ErrorCode, Payload};
use thiserror::Error;

/// Errors from naming server operations.
#[derive(Debug, Error)]
pub enum NamingError {
    /// The path, or a required parent, is not known
    #[error("path not found: {0}")]
    NotFound(Path),

    /// No storage server is registered to place new paths on
    #[error("no storage server is registered")]
    NoStorage,

    /// The exact (storage, command) stub pair is already registered
    #[error("storage server is already registered")]
    AlreadyRegistered,

    /// The server is already running
    #[error("naming server is already running")]
    AlreadyRunning,

    /// The server was stopped and cannot be restarted
    #[error("naming server cannot be restarted")]
    NotRestartable,

    /// A remote call issued on the caller's behalf failed
    #[error("remote call failed: {0}")]
    Rpc(#[from] RpcError),

    /// Malformed path argument
    #[error(transparent)]
    Path(#[from] PathError),
}

impl NamingError {
    /// Maps the error onto its wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            NamingError::NotFound(_) => ErrorCode::NotFound,
            NamingError::NoStorage
            | NamingError::AlreadyRegistered
            | NamingError::AlreadyRunning
            | NamingError::NotRestartable => ErrorCode::IllegalState,
            NamingError::Rpc(_) => ErrorCode::Io,
            NamingError::Path(_) => ErrorCode::IllegalArgument,
        }
    }

    /// Converts the error into a wire error payload.
    pub fn to_payload(&self) -> Payload {
        Payload::error(self.code(), self.to_string())
    }
}
