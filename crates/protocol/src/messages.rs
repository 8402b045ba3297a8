use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope;
use crate::error::ProtocolError;

/// Description of the shared file, sent once at the start of every stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: u64,
    /// Hex-encoded SHA-256 of the whole file.
    pub file_hash: String,
}

/// Discriminator carried in the `type` field of every frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Metadata = 1,
    Chunk = 2,
    Error = 3,
    Done = 4,
}

impl MessageKind {
    /// Maps a wire discriminator back to a kind. Returns `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Metadata),
            2 => Some(Self::Chunk),
            3 => Some(Self::Error),
            4 => Some(Self::Done),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Metadata => "metadata",
            Self::Chunk => "chunk",
            Self::Error => "error",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One protocol message.
///
/// A stream always carries `Metadata`, then any number of `Chunk`s, then
/// exactly one of `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Metadata(FileMetadata),
    /// Raw file bytes. More data may follow.
    Chunk(Vec<u8>),
    /// Human-readable diagnostic; terminates the session as a failure.
    Error(String),
    /// Normal end of the transfer.
    Done,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Metadata(_) => MessageKind::Metadata,
            Self::Chunk(_) => MessageKind::Chunk,
            Self::Error(_) => MessageKind::Error,
            Self::Done => MessageKind::Done,
        }
    }

    /// Serializes the message into a frame payload (without length prefix).
    pub fn to_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        envelope::encode(self)
    }

    /// Parses a frame payload (without length prefix).
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        envelope::decode(payload)
    }
}
