//! Message framing.
//!
//! Every message on the wire is a u32 little-endian length prefix followed by
//! that many bytes of encoded [`Message`]. Frames larger than
//! [`MAX_FRAME_BYTES`](faro_core::MAX_FRAME_BYTES) are rejected.

use bytes::BytesMut;
use faro_core::{WireDecode, WireEncode, MAX_FRAME_BYTES};
use faro_proto::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::RpcError;

/// Writes one framed message.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    let body = message.to_bytes();
    if body.len() > MAX_FRAME_BYTES {
        return Err(RpcError::FrameTooLarge(body.len()));
    }

    let mut frame = BytesMut::with_capacity(4 + body.len());
    (body.len() as u32).encode(&mut frame);
    frame.extend_from_slice(&body);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed message.
///
/// A clean end-of-stream before the length prefix maps to
/// [`RpcError::Closed`]; truncation inside a frame is an IO error.
pub async fn read_message<R>(reader: &mut R) -> Result<Message, RpcError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_bytes).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(RpcError::Closed);
        }
        return Err(e.into());
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(RpcError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Message::from_bytes(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faro_core::Path;
    use faro_proto::Payload;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let message = Message::new(
            42,
            Payload::List {
                path: Path::parse("/a").unwrap(),
            },
        );

        let (mut client, mut server) = tokio::io::duplex(1024);
        write_message(&mut client, &message).await.unwrap();

        let decoded = read_message(&mut server).await.unwrap();
        assert_eq!(decoded.request_id, 42);
    }

    #[tokio::test]
    async fn test_closed_stream_reports_closed() {
        let (client, mut server) = tokio::io::duplex(1024);
        drop(client);
        assert!(matches!(
            read_message(&mut server).await,
            Err(RpcError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let len = (MAX_FRAME_BYTES as u32 + 1).to_le_bytes();
        let mut cursor = std::io::Cursor::new(len.to_vec());
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(RpcError::FrameTooLarge(_))
        ));
    }
}
