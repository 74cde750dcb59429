//! Faro Net - RPC transport layer.
//!
//! Implements the request/response plumbing between faro components:
//! - Length-prefixed message framing over TCP
//! - [`RpcListener`], the server-side skeleton that dispatches decoded
//!   payloads to a [`Handler`]
//! - Typed client stubs for the four RPC surfaces

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod frame;
pub mod listener;
pub mod stubs;

pub use listener::{Handler, RpcListener};
pub use stubs::{CommandStub, RegistrationStub, ServiceStub, StorageStub};

use faro_core::WireError;
use faro_proto::{ErrorCode, MessageType};
use thiserror::Error;

/// RPC transport errors.
#[derive(Debug, Error)]
pub enum RpcError {
    /// IO error on the connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed message bytes
    #[error("decode error: {0}")]
    Decode(#[from] WireError),

    /// Frame exceeds the protocol maximum
    #[error("frame of {0} bytes exceeds maximum")]
    FrameTooLarge(usize),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// Response ID does not match the request
    #[error("response id {got} does not match request id {want}")]
    IdMismatch {
        /// The ID we sent
        want: u64,
        /// The ID we got back
        got: u64,
    },

    /// Response payload has the wrong type for the call
    #[error("unexpected response type: {0:?}")]
    UnexpectedResponse(MessageType),

    /// The peer reported an error
    #[error("remote error ({code:?}): {message}")]
    Remote {
        /// Error kind reported by the peer
        code: ErrorCode,
        /// Detail message
        message: String,
    },
}

impl RpcError {
    /// Returns the remote error code, if the peer reported one.
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self {
            RpcError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}
