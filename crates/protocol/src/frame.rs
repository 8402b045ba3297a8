//! Frame reading and writing.
//!
//! # Wire format
//!
//! ```text
//! [4 bytes BE: payload_len]   (payload_len <= MAX_FRAME_SIZE)
//! [payload_len bytes: JSON envelope, see `envelope`]
//! ```
//!
//! Every read and write runs under its own deadline ([`READ_TIMEOUT`] /
//! [`WRITE_TIMEOUT`]); the deadline ends with the call whatever its outcome.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::constants::{MAX_FRAME_SIZE, READ_TIMEOUT, WRITE_TIMEOUT};
use crate::envelope;
use crate::error::ProtocolError;
use crate::messages::{FileMetadata, Message, MessageKind};

async fn with_deadline<T, F>(limit: Duration, op: F) -> Result<T, ProtocolError>
where
    F: Future<Output = Result<T, ProtocolError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(limit)),
    }
}

async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len() as u64,
            max: MAX_FRAME_SIZE,
        });
    }

    with_deadline(WRITE_TIMEOUT, async {
        writer.write_u32(payload.len() as u32).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    })
    .await?;

    trace!(len = payload.len(), "frame written");
    Ok(())
}

/// Writes one length-prefixed frame and flushes the stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), ProtocolError> {
    let payload = message.to_payload()?;
    write_payload(writer, &payload).await
}

/// Reads one length-prefixed frame.
///
/// A declared length above [`MAX_FRAME_SIZE`] is rejected before any of the
/// body is read. End of stream before the length prefix yields
/// [`ProtocolError::Closed`]; end of stream inside a frame is an I/O error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
    with_deadline(READ_TIMEOUT, async {
        let len = match reader.read_u32().await {
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(ProtocolError::Closed),
            Err(e) => return Err(e.into()),
        };

        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: u64::from(len),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await?;
        trace!(len, "frame read");
        Message::from_payload(&payload)
    })
    .await
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

/// Sends the file description that opens every stream.
pub async fn send_metadata<W: AsyncWrite + Unpin>(
    writer: &mut W,
    metadata: &FileMetadata,
) -> Result<(), ProtocolError> {
    write_frame(writer, &Message::Metadata(metadata.clone())).await
}

/// Receives the opening Metadata frame.
///
/// An Error frame in its place surfaces as [`ProtocolError::Remote`].
pub async fn receive_metadata<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<FileMetadata, ProtocolError> {
    match read_frame(reader).await? {
        Message::Metadata(metadata) => Ok(metadata),
        Message::Error(message) => Err(ProtocolError::Remote(message)),
        other => Err(ProtocolError::UnexpectedMessage {
            expected: MessageKind::Metadata,
            actual: other.kind(),
        }),
    }
}

/// Sends a span of file bytes.
pub async fn send_chunk<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let payload = envelope::encode_chunk(data)?;
    write_payload(writer, &payload).await
}

/// Receives the next chunk.
///
/// Returns `Ok(None)` when the sender signalled Done in place of a chunk.
pub async fn receive_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    match read_frame(reader).await? {
        Message::Chunk(data) => Ok(Some(data)),
        Message::Done => Ok(None),
        Message::Error(message) => Err(ProtocolError::Remote(message)),
        other => Err(ProtocolError::UnexpectedMessage {
            expected: MessageKind::Chunk,
            actual: other.kind(),
        }),
    }
}

/// Signals the normal end of the transfer.
pub async fn send_done<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), ProtocolError> {
    write_frame(writer, &Message::Done).await
}

/// Reports a failure to the peer; the session ends after this frame.
pub async fn send_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &str,
) -> Result<(), ProtocolError> {
    write_frame(writer, &Message::Error(message.to_string())).await
}
