//! Faro Proto - RPC message types.
//!
//! Defines the messages exchanged between clients, the naming server, and
//! storage servers:
//! - The service surface (naming server, client-facing)
//! - The registration surface (naming server, storage-facing)
//! - The storage surface (storage server, client-facing)
//! - The command surface (storage server, naming-facing)

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod messages;
pub mod stub;

pub use messages::{ErrorCode, Message, MessageType, Payload, RequestId};
pub use stub::StubAddr;
