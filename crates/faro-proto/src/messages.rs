//! RPC message types and their wire encoding.
//!
//! All four endpoints exchange the same [`Message`] envelope; each endpoint
//! answers only the requests belonging to its own surface and rejects the
//! rest with [`ErrorCode::InvalidRequest`].

use bytes::{Bytes, BytesMut};
use faro_core::{Path, WireDecode, WireEncode, WireError};
use serde::{Deserialize, Serialize};

use crate::stub::StubAddr;

/// Message type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    // Service surface (naming server, client-facing)
    /// Is-directory query
    IsDirectory = 0,
    /// Directory listing query
    List = 1,
    /// Create a file
    CreateFile = 2,
    /// Create a directory
    CreateDirectory = 3,
    /// Delete a path
    Delete = 4,
    /// Look up a storage stub for a path
    GetStorage = 5,

    // Service responses
    /// Boolean result
    Flag = 10,
    /// Name listing result
    Names = 11,
    /// Storage stub result
    Stub = 12,

    // Registration surface (naming server, storage-facing)
    /// Storage server registration
    Register = 20,
    /// Registration response carrying the delete list
    DeleteList = 21,

    // Storage surface (storage server, client-facing)
    /// File size query
    Size = 30,
    /// Ranged read
    Read = 31,
    /// Ranged write
    Write = 32,

    // Storage responses
    /// Size result
    Length = 40,
    /// Read result
    Data = 41,
    /// Write acknowledgement
    Done = 42,

    // Command surface (storage server, naming-facing)
    /// Create a file or directory on local disk
    CommandCreate = 50,
    /// Delete a path from local disk
    CommandDelete = 51,

    /// Error response
    Error = 255,
}

impl MessageType {
    /// Returns the tag value.
    pub fn tag(&self) -> u32 {
        *self as u32
    }

    /// Creates from a tag value.
    pub fn from_tag(tag: u32) -> Result<Self, WireError> {
        match tag {
            0 => Ok(MessageType::IsDirectory),
            1 => Ok(MessageType::List),
            2 => Ok(MessageType::CreateFile),
            3 => Ok(MessageType::CreateDirectory),
            4 => Ok(MessageType::Delete),
            5 => Ok(MessageType::GetStorage),
            10 => Ok(MessageType::Flag),
            11 => Ok(MessageType::Names),
            12 => Ok(MessageType::Stub),
            20 => Ok(MessageType::Register),
            21 => Ok(MessageType::DeleteList),
            30 => Ok(MessageType::Size),
            31 => Ok(MessageType::Read),
            32 => Ok(MessageType::Write),
            40 => Ok(MessageType::Length),
            41 => Ok(MessageType::Data),
            42 => Ok(MessageType::Done),
            50 => Ok(MessageType::CommandCreate),
            51 => Ok(MessageType::CommandDelete),
            255 => Ok(MessageType::Error),
            _ => Err(WireError::InvalidTag(tag)),
        }
    }
}

/// Request/response ID for matching.
pub type RequestId = u64;

/// Error codes for error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    /// Internal server error
    Internal = 0,
    /// Path (or required parent) not known
    NotFound = 1,
    /// Malformed path or argument
    IllegalArgument = 2,
    /// Operation invalid in the current state
    IllegalState = 3,
    /// Offset or length out of bounds
    IndexOutOfBounds = 4,
    /// Local filesystem failure
    Io = 5,
    /// Request does not belong to this endpoint's surface
    InvalidRequest = 6,
}

impl ErrorCode {
    /// Creates from a tag value.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            1 => ErrorCode::NotFound,
            2 => ErrorCode::IllegalArgument,
            3 => ErrorCode::IllegalState,
            4 => ErrorCode::IndexOutOfBounds,
            5 => ErrorCode::Io,
            6 => ErrorCode::InvalidRequest,
            _ => ErrorCode::Internal,
        }
    }
}

/// RPC message envelope.
///
/// The caller picks a request ID; the responder echoes it.
#[derive(Debug, Clone)]
pub struct Message {
    /// Request identifier, echoed in the response
    pub request_id: RequestId,
    /// Message payload
    pub payload: Payload,
}

impl Message {
    /// Creates a new message.
    pub fn new(request_id: RequestId, payload: Payload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Returns the message type.
    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}

impl WireEncode for Message {
    fn encode(&self, buf: &mut BytesMut) {
        self.request_id.encode(buf);
        self.payload.encode(buf);
    }
}

impl WireDecode for Message {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            request_id: RequestId::decode(buf)?,
            payload: Payload::decode(buf)?,
        })
    }
}

/// Message payload variants across all four surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    // Service surface
    /// Is the path a directory?
    IsDirectory {
        /// Path to query
        path: Path,
    },
    /// List the children of a directory
    List {
        /// Directory to list
        path: Path,
    },
    /// Create a file
    CreateFile {
        /// Path of the new file
        path: Path,
    },
    /// Create a directory
    CreateDirectory {
        /// Path of the new directory
        path: Path,
    },
    /// Delete a file or directory
    Delete {
        /// Path to delete
        path: Path,
    },
    /// Look up a storage stub hosting a path
    GetStorage {
        /// Path to locate
        path: Path,
    },

    // Service responses
    /// Boolean result
    Flag {
        /// The result
        value: bool,
    },
    /// Child names of a directory
    Names {
        /// Unique child names, unordered
        names: Vec<String>,
    },
    /// A storage stub
    Stub {
        /// Address of the storage endpoint
        addr: StubAddr,
    },

    // Registration surface
    /// Storage server registration
    Register {
        /// Storage (data) endpoint of the registering server
        storage: StubAddr,
        /// Command endpoint of the registering server
        command: StubAddr,
        /// Advisory capacity hint for placement
        capacity: u64,
        /// Files the server already holds
        paths: Vec<Path>,
    },
    /// Paths the registering server must delete locally
    DeleteList {
        /// The delete list
        paths: Vec<Path>,
    },

    // Storage surface
    /// File size query
    Size {
        /// File to measure
        path: Path,
    },
    /// Ranged read
    Read {
        /// File to read
        path: Path,
        /// Byte offset of the first byte
        offset: u64,
        /// Exact number of bytes to return
        length: u32,
    },
    /// Ranged write
    Write {
        /// File to write
        path: Path,
        /// Byte offset of the first byte
        offset: u64,
        /// Bytes to write
        data: Vec<u8>,
    },

    // Storage responses
    /// Size result
    Length {
        /// File size in bytes
        value: u64,
    },
    /// Read result
    Data {
        /// Exactly the requested bytes
        bytes: Vec<u8>,
    },
    /// Write acknowledgement
    Done,

    // Command surface
    /// Create a file or directory on the storage server's local disk
    CommandCreate {
        /// Path to create
        path: Path,
        /// Create a directory instead of an empty file
        directory: bool,
    },
    /// Delete a path from the storage server's local disk
    CommandDelete {
        /// Path to delete
        path: Path,
    },

    /// Error response
    Error {
        /// Error kind
        code: ErrorCode,
        /// Human-readable detail
        message: String,
    },
}

impl Payload {
    /// Returns the message type for this payload.
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::IsDirectory { .. } => MessageType::IsDirectory,
            Payload::List { .. } => MessageType::List,
            Payload::CreateFile { .. } => MessageType::CreateFile,
            Payload::CreateDirectory { .. } => MessageType::CreateDirectory,
            Payload::Delete { .. } => MessageType::Delete,
            Payload::GetStorage { .. } => MessageType::GetStorage,
            Payload::Flag { .. } => MessageType::Flag,
            Payload::Names { .. } => MessageType::Names,
            Payload::Stub { .. } => MessageType::Stub,
            Payload::Register { .. } => MessageType::Register,
            Payload::DeleteList { .. } => MessageType::DeleteList,
            Payload::Size { .. } => MessageType::Size,
            Payload::Read { .. } => MessageType::Read,
            Payload::Write { .. } => MessageType::Write,
            Payload::Length { .. } => MessageType::Length,
            Payload::Data { .. } => MessageType::Data,
            Payload::Done => MessageType::Done,
            Payload::CommandCreate { .. } => MessageType::CommandCreate,
            Payload::CommandDelete { .. } => MessageType::CommandDelete,
            Payload::Error { .. } => MessageType::Error,
        }
    }

    /// Shorthand for an error payload.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Payload::Error {
            code,
            message: message.into(),
        }
    }
}

impl WireEncode for Payload {
    fn encode(&self, buf: &mut BytesMut) {
        self.message_type().tag().encode(buf);
        match self {
            Payload::IsDirectory { path }
            | Payload::List { path }
            | Payload::CreateFile { path }
            | Payload::CreateDirectory { path }
            | Payload::Delete { path }
            | Payload::GetStorage { path }
            | Payload::Size { path }
            | Payload::CommandDelete { path } => path.encode(buf),
            Payload::Flag { value } => value.encode(buf),
            Payload::Names { names } => names.encode(buf),
            Payload::Stub { addr } => addr.encode(buf),
            Payload::Register {
                storage,
                command,
                capacity,
                paths,
            } => {
                storage.encode(buf);
                command.encode(buf);
                capacity.encode(buf);
                paths.encode(buf);
            }
            Payload::DeleteList { paths } => paths.encode(buf),
            Payload::Read {
                path,
                offset,
                length,
            } => {
                path.encode(buf);
                offset.encode(buf);
                length.encode(buf);
            }
            Payload::Write { path, offset, data } => {
                path.encode(buf);
                offset.encode(buf);
                data.encode(buf);
            }
            Payload::Length { value } => value.encode(buf),
            Payload::Data { bytes } => bytes.encode(buf),
            Payload::Done => {}
            Payload::CommandCreate { path, directory } => {
                path.encode(buf);
                directory.encode(buf);
            }
            Payload::Error { code, message } => {
                (*code as u32).encode(buf);
                message.encode(buf);
            }
        }
    }
}

impl WireDecode for Payload {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        let tag = u32::decode(buf)?;
        let msg_type = MessageType::from_tag(tag)?;

        Ok(match msg_type {
            MessageType::IsDirectory => Payload::IsDirectory {
                path: Path::decode(buf)?,
            },
            MessageType::List => Payload::List {
                path: Path::decode(buf)?,
            },
            MessageType::CreateFile => Payload::CreateFile {
                path: Path::decode(buf)?,
            },
            MessageType::CreateDirectory => Payload::CreateDirectory {
                path: Path::decode(buf)?,
            },
            MessageType::Delete => Payload::Delete {
                path: Path::decode(buf)?,
            },
            MessageType::GetStorage => Payload::GetStorage {
                path: Path::decode(buf)?,
            },
            MessageType::Flag => Payload::Flag {
                value: bool::decode(buf)?,
            },
            MessageType::Names => Payload::Names {
                names: Vec::<String>::decode(buf)?,
            },
            MessageType::Stub => Payload::Stub {
                addr: StubAddr::decode(buf)?,
            },
            MessageType::Register => Payload::Register {
                storage: StubAddr::decode(buf)?,
                command: StubAddr::decode(buf)?,
                capacity: u64::decode(buf)?,
                paths: Vec::<Path>::decode(buf)?,
            },
            MessageType::DeleteList => Payload::DeleteList {
                paths: Vec::<Path>::decode(buf)?,
            },
            MessageType::Size => Payload::Size {
                path: Path::decode(buf)?,
            },
            MessageType::Read => Payload::Read {
                path: Path::decode(buf)?,
                offset: u64::decode(buf)?,
                length: u32::decode(buf)?,
            },
            MessageType::Write => Payload::Write {
                path: Path::decode(buf)?,
                offset: u64::decode(buf)?,
                data: Vec::<u8>::decode(buf)?,
            },
            MessageType::Length => Payload::Length {
                value: u64::decode(buf)?,
            },
            MessageType::Data => Payload::Data {
                bytes: Vec::<u8>::decode(buf)?,
            },
            MessageType::Done => Payload::Done,
            MessageType::CommandCreate => Payload::CommandCreate {
                path: Path::decode(buf)?,
                directory: bool::decode(buf)?,
            },
            MessageType::CommandDelete => Payload::CommandDelete {
                path: Path::decode(buf)?,
            },
            MessageType::Error => Payload::Error {
                code: ErrorCode::from_tag(u32::decode(buf)?),
                message: String::decode(buf)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let msg = Message::new(
            12345,
            Payload::IsDirectory {
                path: Path::parse("/a/b").unwrap(),
            },
        );

        let decoded = Message::from_bytes(&msg.to_vec()).unwrap();
        assert_eq!(decoded.request_id, 12345);
        assert!(matches!(
            decoded.payload,
            Payload::IsDirectory { ref path } if path.to_string() == "/a/b"
        ));
    }

    #[test]
    fn test_register_roundtrip() {
        let msg = Message::new(
            7,
            Payload::Register {
                storage: StubAddr::new("host", 7000),
                command: StubAddr::new("host", 7001),
                capacity: 1024,
                paths: vec![
                    Path::parse("/a/b.txt").unwrap(),
                    Path::parse("/c/d.txt").unwrap(),
                ],
            },
        );

        let decoded = Message::from_bytes(&msg.to_vec()).unwrap();
        if let Payload::Register {
            storage,
            command,
            capacity,
            paths,
        } = decoded.payload
        {
            assert_eq!(storage.port, 7000);
            assert_eq!(command.port, 7001);
            assert_eq!(capacity, 1024);
            assert_eq!(paths.len(), 2);
        } else {
            panic!("expected Register payload");
        }
    }

    #[test]
    fn test_error_roundtrip() {
        let msg = Message::new(
            1,
            Payload::error(ErrorCode::NotFound, "no such path"),
        );

        let decoded = Message::from_bytes(&msg.to_vec()).unwrap();
        if let Payload::Error { code, message } = decoded.payload {
            assert_eq!(code, ErrorCode::NotFound);
            assert_eq!(message, "no such path");
        } else {
            panic!("expected Error payload");
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut buf = BytesMut::new();
        99u32.encode(&mut buf);
        assert!(matches!(
            Payload::from_bytes(&buf),
            Err(WireError::InvalidTag(99))
        ));
    }

    #[test]
    fn test_read_request_fields() {
        let msg = Message::new(
            3,
            Payload::Read {
                path: Path::parse("/f").unwrap(),
                offset: 10,
                length: 2,
            },
        );

        let decoded = Message::from_bytes(&msg.to_vec()).unwrap();
        if let Payload::Read {
            offset, length, ..
        } = decoded.payload
        {
            assert_eq!(offset, 10);
            assert_eq!(length, 2);
        } else {
            panic!("expected Read payload");
        }
    }
}
