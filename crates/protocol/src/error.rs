//! Error types for the frame codec.

use std::time::Duration;

use crate::messages::MessageKind;

/// Errors produced while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("stream closed by peer")]
    Closed,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u32 },

    #[error("malformed frame payload: {0}")]
    Decode(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("expected {expected} message, got {actual}")]
    UnexpectedMessage {
        expected: MessageKind,
        actual: MessageKind,
    },

    /// The peer sent an Error frame; the payload is its diagnostic.
    #[error("remote error: {0}")]
    Remote(String),
}
