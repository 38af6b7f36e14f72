//! Native-messaging frames: a little-endian `u32` byte length followed by
//! that many bytes of UTF-8 JSON.

use std::io;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message the browser accepts from a host.
pub const MAX_OUTGOING_FRAME: usize = 1024 * 1024;
/// Largest message the browser sends to a host.
pub const MAX_INCOMING_FRAME: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the limit")]
    TooLarge(usize),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads one frame. Returns `None` when the stream ends cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => {
                return Err(FrameError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("length prefix cut off after {filled} bytes"),
                )))
            }
            read => filled += read,
        }
    }
    let length = u32::from_le_bytes(header) as usize;
    if length > MAX_INCOMING_FRAME {
        return Err(FrameError::TooLarge(length));
    }

    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Serializes `message` and writes it as one frame. Oversized messages are
/// rejected before anything is written.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_OUTGOING_FRAME {
        return Err(FrameError::TooLarge(body.len()));
    }

    writer.write_u32_le(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::io::duplex;

    #[tokio::test]
    async fn frames_carry_a_little_endian_length() {
        let (mut client, mut server) = duplex(1024);
        write_frame(&mut client, &json!({ "type": "start_scan" }))
            .await
            .unwrap();
        drop(client);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        let body = br#"{"type":"start_scan"}"#;
        assert_eq!(&raw[..4], &(body.len() as u32).to_le_bytes());
        assert_eq!(&raw[4..], body);
    }

    #[tokio::test]
    async fn reads_consecutive_frames_then_end_of_stream() {
        let (mut client, mut server) = duplex(1024);
        write_frame(&mut client, &json!({ "n": 1 })).await.unwrap();
        write_frame(&mut client, &json!({ "n": 2 })).await.unwrap();
        drop(client);

        for expected in [1, 2] {
            let frame = read_frame(&mut server).await.unwrap().unwrap();
            let value: Value = serde_json::from_slice(&frame).unwrap();
            assert_eq!(value["n"], expected);
        }
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_outgoing_frame_is_rejected() {
        let (mut client, mut server) = duplex(64);
        let huge = "x".repeat(MAX_OUTGOING_FRAME);

        let err = write_frame(&mut client, &huge).await.unwrap_err();

        assert!(matches!(err, FrameError::TooLarge(len) if len > MAX_OUTGOING_FRAME));
        drop(client);
        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let (mut client, mut server) = duplex(64);
        client.write_u32_le(10).await.unwrap();
        client.write_all(b"{}").await.unwrap();
        drop(client);

        assert!(matches!(read_frame(&mut server).await, Err(FrameError::Io(_))));
    }

    #[tokio::test]
    async fn truncated_length_prefix_is_an_error() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[7, 0]).await.unwrap();
        drop(client);

        match read_frame(&mut server).await {
            Err(FrameError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected a truncation error, got {other:?}"),
        }
    }
}
