//! Typed client stubs.
//!
//! A stub wraps a [`StubAddr`] and turns method calls into framed
//! request/response exchanges. Each call dials a fresh connection; the
//! operations here are occasional control-plane calls, and a dial per call
//! keeps stubs free of shared connection state.

use faro_core::Path;
use faro_proto::{Message, Payload, RequestId, StubAddr};
use tokio::net::TcpStream;

use crate::frame::{read_message, write_message};
use crate::RpcError;

/// Performs one request/response exchange against an endpoint.
pub async fn call(addr: &StubAddr, payload: Payload) -> Result<Payload, RpcError> {
    let mut stream = TcpStream::connect((addr.host.as_str(), addr.port)).await?;

    let request_id: RequestId = rand::random();
    write_message(&mut stream, &Message::new(request_id, payload)).await?;

    let response = read_message(&mut stream).await?;
    if response.request_id != request_id {
        return Err(RpcError::IdMismatch {
            want: request_id,
            got: response.request_id,
        });
    }

    match response.payload {
        Payload::Error { code, message } => Err(RpcError::Remote { code, message }),
        payload => Ok(payload),
    }
}

fn expect_flag(payload: Payload) -> Result<bool, RpcError> {
    match payload {
        Payload::Flag { value } => Ok(value),
        other => Err(RpcError::UnexpectedResponse(other.message_type())),
    }
}

/// Client stub for the naming server's service surface.
#[derive(Debug, Clone)]
pub struct ServiceStub {
    addr: StubAddr,
}

impl ServiceStub {
    /// Creates a stub for the given service endpoint.
    pub fn new(addr: StubAddr) -> Self {
        Self { addr }
    }

    /// Returns the endpoint address.
    pub fn addr(&self) -> &StubAddr {
        &self.addr
    }

    /// Asks whether the path names a directory.
    pub async fn is_directory(&self, path: &Path) -> Result<bool, RpcError> {
        expect_flag(call(&self.addr, Payload::IsDirectory { path: path.clone() }).await?)
    }

    /// Lists the children of a directory.
    pub async fn list(&self, path: &Path) -> Result<Vec<String>, RpcError> {
        match call(&self.addr, Payload::List { path: path.clone() }).await? {
            Payload::Names { names } => Ok(names),
            other => Err(RpcError::UnexpectedResponse(other.message_type())),
        }
    }

    /// Creates a file. Returns false if the path already exists.
    pub async fn create_file(&self, path: &Path) -> Result<bool, RpcError> {
        expect_flag(call(&self.addr, Payload::CreateFile { path: path.clone() }).await?)
    }

    /// Creates a directory. Returns false if the path already exists.
    pub async fn create_directory(&self, path: &Path) -> Result<bool, RpcError> {
        expect_flag(call(&self.addr, Payload::CreateDirectory { path: path.clone() }).await?)
    }

    /// Deletes a file or directory.
    pub async fn delete(&self, path: &Path) -> Result<bool, RpcError> {
        expect_flag(call(&self.addr, Payload::Delete { path: path.clone() }).await?)
    }

    /// Returns a storage stub hosting the path.
    pub async fn get_storage(&self, path: &Path) -> Result<StorageStub, RpcError> {
        match call(&self.addr, Payload::GetStorage { path: path.clone() }).await? {
            Payload::Stub { addr } => Ok(StorageStub::new(addr)),
            other => Err(RpcError::UnexpectedResponse(other.message_type())),
        }
    }
}

/// Client stub for the naming server's registration surface.
#[derive(Debug, Clone)]
pub struct RegistrationStub {
    addr: StubAddr,
}

impl RegistrationStub {
    /// Creates a stub for the given registration endpoint.
    pub fn new(addr: StubAddr) -> Self {
        Self { addr }
    }

    /// Registers a storage server and returns the delete list.
    pub async fn register(
        &self,
        storage: StubAddr,
        command: StubAddr,
        capacity: u64,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>, RpcError> {
        let payload = Payload::Register {
            storage,
            command,
            capacity,
            paths,
        };
        match call(&self.addr, payload).await? {
            Payload::DeleteList { paths } => Ok(paths),
            other => Err(RpcError::UnexpectedResponse(other.message_type())),
        }
    }
}

/// Client stub for a storage server's data surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStub {
    addr: StubAddr,
}

impl StorageStub {
    /// Creates a stub for the given storage endpoint.
    pub fn new(addr: StubAddr) -> Self {
        Self { addr }
    }

    /// Returns the endpoint address.
    pub fn addr(&self) -> &StubAddr {
        &self.addr
    }

    /// Returns the size of a file in bytes.
    pub async fn size(&self, path: &Path) -> Result<u64, RpcError> {
        match call(&self.addr, Payload::Size { path: path.clone() }).await? {
            Payload::Length { value } => Ok(value),
            other => Err(RpcError::UnexpectedResponse(other.message_type())),
        }
    }

    /// Reads exactly `length` bytes starting at `offset`.
    pub async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, RpcError> {
        let payload = Payload::Read {
            path: path.clone(),
            offset,
            length,
        };
        match call(&self.addr, payload).await? {
            Payload::Data { bytes } => Ok(bytes),
            other => Err(RpcError::UnexpectedResponse(other.message_type())),
        }
    }

    /// Writes `data` starting at `offset`.
    pub async fn write(&self, path: &Path, offset: u64, data: Vec<u8>) -> Result<(), RpcError> {
        let payload = Payload::Write {
            path: path.clone(),
            offset,
            data,
        };
        match call(&self.addr, payload).await? {
            Payload::Done => Ok(()),
            other => Err(RpcError::UnexpectedResponse(other.message_type())),
        }
    }
}

/// Client stub for a storage server's command surface.
#[derive(Debug, Clone)]
pub struct CommandStub {
    addr: StubAddr,
}

impl CommandStub {
    /// Creates a stub for the given command endpoint.
    pub fn new(addr: StubAddr) -> Self {
        Self { addr }
    }

    /// Creates a file or directory. Returns false if the path exists.
    pub async fn create(&self, path: &Path, directory: bool) -> Result<bool, RpcError> {
        let payload = Payload::CommandCreate {
            path: path.clone(),
            directory,
        };
        expect_flag(call(&self.addr, payload).await?)
    }

    /// Deletes a path, recursively for directories.
    pub async fn delete(&self, path: &Path) -> Result<bool, RpcError> {
        expect_flag(call(&self.addr, Payload::CommandDelete { path: path.clone() }).await?)
    }
}
