//! Connection handshake.
//!
//! # Wire format
//!
//! ```text
//! HELLO (dialer -> listener):
//!   [32 bytes: node id, hex ASCII]
//!   [2 bytes BE: protocol_len]
//!   [protocol_len bytes: protocol id UTF-8]
//!
//! RESPONSE (listener -> dialer): [1 byte]
//!   0x01 = accepted, stream follows
//!   0x00 = wrong node id
//!   0x02 = no handler for protocol
//! ```
//!
//! After an accepted response the connection is a plain byte stream owned by
//! the protocol handler.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::PeerError;
use crate::node_id::NODE_ID_LEN;

/// Handshake response: accepted.
pub const HELLO_OK: u8 = 0x01;

/// Handshake response: the dialer addressed a different node.
pub const HELLO_WRONG_NODE: u8 = 0x00;

/// Handshake response: no handler registered for the protocol.
pub const HELLO_NO_HANDLER: u8 = 0x02;

/// The dialer's opening message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub node_id: String,
    pub protocol: String,
}

/// The listener's verdict on a [`Hello`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeResponse {
    Accepted,
    WrongNode,
    NoHandler,
}

impl HandshakeResponse {
    fn as_u8(self) -> u8 {
        match self {
            Self::Accepted => HELLO_OK,
            Self::WrongNode => HELLO_WRONG_NODE,
            Self::NoHandler => HELLO_NO_HANDLER,
        }
    }

    fn from_u8(byte: u8) -> Result<Self, PeerError> {
        match byte {
            HELLO_OK => Ok(Self::Accepted),
            HELLO_WRONG_NODE => Ok(Self::WrongNode),
            HELLO_NO_HANDLER => Ok(Self::NoHandler),
            other => Err(PeerError::Handshake(format!(
                "unknown handshake response 0x{other:02x}"
            ))),
        }
    }
}

/// Writes the dialer's hello.
pub async fn write_hello<W: AsyncWrite + Unpin>(
    writer: &mut W,
    hello: &Hello,
) -> Result<(), PeerError> {
    if hello.node_id.len() != NODE_ID_LEN {
        return Err(PeerError::Handshake(format!(
            "node id must be {NODE_ID_LEN} bytes, got {}",
            hello.node_id.len()
        )));
    }
    let protocol = hello.protocol.as_bytes();
    if protocol.is_empty() || protocol.len() > u16::MAX as usize {
        return Err(PeerError::Handshake(format!(
            "protocol id length out of range: {}",
            protocol.len()
        )));
    }

    writer.write_all(hello.node_id.as_bytes()).await?;
    writer.write_u16(protocol.len() as u16).await?;
    writer.write_all(protocol).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the dialer's hello.
pub async fn read_hello<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Hello, PeerError> {
    let mut id_buf = [0u8; NODE_ID_LEN];
    reader.read_exact(&mut id_buf).await?;
    let node_id = String::from_utf8(id_buf.to_vec())
        .map_err(|e| PeerError::Handshake(format!("invalid node id encoding: {e}")))?;

    let protocol_len = reader.read_u16().await?;
    if protocol_len == 0 {
        return Err(PeerError::Handshake("empty protocol id".into()));
    }
    let mut protocol_buf = vec![0u8; protocol_len as usize];
    reader.read_exact(&mut protocol_buf).await?;
    let protocol = String::from_utf8(protocol_buf)
        .map_err(|e| PeerError::Handshake(format!("invalid protocol id encoding: {e}")))?;

    Ok(Hello { node_id, protocol })
}

/// Writes the listener's response byte.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: HandshakeResponse,
) -> Result<(), PeerError> {
    writer.write_u8(response.as_u8()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the listener's response byte.
pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<HandshakeResponse, PeerError> {
    let byte = reader.read_u8().await?;
    HandshakeResponse::from_u8(byte)
}
