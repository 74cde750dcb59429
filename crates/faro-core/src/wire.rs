//! Wire encoding for faro messages.
//!
//! Every value that crosses an RPC endpoint uses this encoding so both sides
//! agree on an exact byte representation.
//!
//! # Encoding Rules
//!
//! - **Integers**: little-endian
//! - **Booleans**: one byte, `0x00` or `0x01`
//! - **Strings**: u32 byte length followed by UTF-8 bytes
//! - **Variable sequences**: u32 length prefix followed by elements
//! - **Options**: `0x00` for `None`, `0x01` + value for `Some`
//! - **Structs**: fields encoded in declaration order without padding
//! - **Enums**: u32 tag followed by payload fields
//! - **Paths**: canonical string form

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::path::{Path, PathError};

/// Errors during wire decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Not enough bytes to decode
    #[error("insufficient bytes: expected {expected}, got {available}")]
    InsufficientBytes {
        /// Expected number of bytes
        expected: usize,
        /// Actually available bytes
        available: usize,
    },

    /// Invalid UTF-8 string
    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(String),

    /// Invalid enum tag
    #[error("invalid enum tag: {0}")]
    InvalidTag(u32),

    /// Invalid boolean byte
    #[error("invalid boolean byte: {0}")]
    InvalidBool(u8),

    /// Malformed path string
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
}

/// Trait for types that can be encoded to wire representation.
pub trait WireEncode {
    /// Encodes the value into the buffer.
    fn encode(&self, buf: &mut BytesMut);

    /// Returns the encoded byte representation.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Returns the encoded byte representation as a `Vec`.
    fn to_vec(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

/// Trait for types that can be decoded from wire representation.
pub trait WireDecode: Sized {
    /// Decodes a value from the buffer, consuming its bytes.
    fn decode(buf: &mut Bytes) -> Result<Self, WireError>;

    /// Decodes a value from a byte slice.
    fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        Self::decode(&mut buf)
    }
}

fn ensure(buf: &Bytes, expected: usize) -> Result<(), WireError> {
    if buf.remaining() < expected {
        return Err(WireError::InsufficientBytes {
            expected,
            available: buf.remaining(),
        });
    }
    Ok(())
}

impl WireEncode for u8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self);
    }
}

impl WireDecode for u8 {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 1)?;
        Ok(buf.get_u8())
    }
}

impl WireEncode for u16 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(*self);
    }
}

impl WireDecode for u16 {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 2)?;
        Ok(buf.get_u16_le())
    }
}

impl WireEncode for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }
}

impl WireDecode for u32 {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 4)?;
        Ok(buf.get_u32_le())
    }
}

impl WireEncode for u64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(*self);
    }
}

impl WireDecode for u64 {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 8)?;
        Ok(buf.get_u64_le())
    }
}

impl WireEncode for i64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64_le(*self);
    }
}

impl WireDecode for i64 {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 8)?;
        Ok(buf.get_i64_le())
    }
}

impl WireEncode for bool {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self as u8);
    }
}

impl WireDecode for bool {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        match u8::decode(buf)? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }
}

impl WireEncode for String {
    fn encode(&self, buf: &mut BytesMut) {
        self.as_str().encode(buf);
    }
}

impl WireDecode for String {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        let len = u32::decode(buf)? as usize;
        ensure(buf, len)?;
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|e| WireError::InvalidUtf8(e.to_string()))
    }
}

impl WireEncode for &str {
    fn encode(&self, buf: &mut BytesMut) {
        let bytes = self.as_bytes();
        assert!(bytes.len() <= u32::MAX as usize, "string length exceeds u32::MAX");
        (bytes.len() as u32).encode(buf);
        buf.put_slice(bytes);
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        assert!(self.len() <= u32::MAX as usize, "sequence length exceeds u32::MAX");
        (self.len() as u32).encode(buf);
        for item in self {
            item.encode(buf);
        }
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        let len = u32::decode(buf)? as usize;
        // Cap the preallocation; a hostile length prefix must not OOM us.
        let mut vec = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            vec.push(T::decode(buf)?);
        }
        Ok(vec)
    }
}

impl<T: WireEncode> WireEncode for Option<T> {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            None => buf.put_u8(0x00),
            Some(value) => {
                buf.put_u8(0x01);
                value.encode(buf);
            }
        }
    }
}

impl<T: WireDecode> WireDecode for Option<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        match u8::decode(buf)? {
            0x00 => Ok(None),
            0x01 => Ok(Some(T::decode(buf)?)),
            tag => Err(WireError::InvalidTag(tag as u32)),
        }
    }
}

impl WireEncode for Path {
    fn encode(&self, buf: &mut BytesMut) {
        self.to_string().encode(buf);
    }
}

impl WireDecode for Path {
    fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        let s = String::decode(buf)?;
        Ok(Path::parse(&s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_encoding() {
        let value: u32 = 1;
        assert_eq!(value.to_vec(), vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_string_encoding() {
        let s = String::from("hello");
        assert_eq!(
            s.to_vec(),
            vec![0x05, 0x00, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn test_vec_encoding() {
        let vec: Vec<u8> = vec![0xAA, 0xBB, 0xCC];
        assert_eq!(vec.to_vec(), vec![0x03, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_bool_rejects_garbage() {
        assert_eq!(bool::from_bytes(&[0x02]), Err(WireError::InvalidBool(0x02)));
        assert_eq!(bool::from_bytes(&[0x01]), Ok(true));
    }

    #[test]
    fn test_path_roundtrip() {
        let path = Path::parse("/a/b.txt").unwrap();
        let decoded = Path::from_bytes(&path.to_vec()).unwrap();
        assert_eq!(path, decoded);
    }

    #[test]
    fn test_path_decode_validates() {
        // An encoded relative path string must not decode.
        let mut buf = BytesMut::new();
        "a/b".encode(&mut buf);
        assert!(matches!(
            Path::from_bytes(&buf),
            Err(WireError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let value: u64 = 42;
        let encoded = value.to_vec();
        assert!(matches!(
            u64::from_bytes(&encoded[..4]),
            Err(WireError::InsufficientBytes { .. })
        ));
    }

    #[test]
    fn test_option_roundtrip() {
        let some: Option<u32> = Some(7);
        assert_eq!(Option::<u32>::from_bytes(&some.to_vec()).unwrap(), some);

        let none: Option<u32> = None;
        assert_eq!(none.to_vec(), vec![0x00]);
    }
}
