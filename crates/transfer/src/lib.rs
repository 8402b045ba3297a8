//! Sender and receiver sessions for single-file transfers.
//!
//! The sender hashes a file, publishes a [`Ticket`](sendme_ticket::Ticket)
//! and serves the file to every peer that opens a transfer stream. The
//! receiver redeems a ticket, streams the file to disk, and verifies its
//! SHA-256 before reporting success.

mod checksum;
mod progress;
pub mod receiver;
pub mod sender;
mod validation;

use std::path::PathBuf;

use sendme_peer::PeerError;
use sendme_protocol::ProtocolError;
use sendme_ticket::TicketError;

pub use checksum::{calculate_file_checksum, checksum_bytes, hash_file};
pub use progress::{
    ProgressCallback, ProgressReporter, TransferProgress, calculate_speed, format_file_size,
    format_progress, format_speed,
};
pub use receiver::{ReceiveOptions, ReceiveReport, receive_file};
pub use sender::{ShareConfig, ShareOptions, ShareSession, StreamOutcome, start_share};
pub use validation::{resolve_destination, validate_file_name};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection failed: {0}")]
    Connect(#[from] PeerError),

    #[error("local address unavailable: {0}")]
    LocalAddress(#[source] PeerError),

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// True when the peer aborted the transfer with an Error frame.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::Remote(_)))
    }
}
