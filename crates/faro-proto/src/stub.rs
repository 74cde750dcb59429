//! Stub addresses.
//!
//! A stub is the client-side handle for one remote endpoint. On the wire a
//! stub is just the endpoint's address; the calling machinery lives in
//! `faro-net`.

use std::fmt;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use faro_core::{WireDecode, WireEncode, WireError};
use serde::{Deserialize, Serialize};

/// The advertised address of one remote endpoint.
///
/// The host is the externally-routable hostname the owning server was
/// configured with, so stubs handed to third parties stay reachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StubAddr {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl StubAddr {
    /// Creates a new stub address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Creates a stub address from a bound socket address and an advertised
    /// hostname.
    pub fn advertised(host: impl Into<String>, bound: SocketAddr) -> Self {
        Self::new(host, bound.port())
    }
}

impl fmt::Display for StubAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl WireEncode for StubAddr {
    fn encode(&self, buf: &mut BytesMut) {
        self.host.encode(buf);
        self.port.encode(buf);
    }
}

impl WireDecode for StubAddr {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            host: String::decode(buf)?,
            port: u16::decode(buf)?,
        })
    }
}
