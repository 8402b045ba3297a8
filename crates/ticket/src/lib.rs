//! Capability tickets.
//!
//! A ticket is everything a receiver needs to fetch a shared file: where the
//! sender can be reached and which content to expect. It travels out of band
//! (chat, email, clipboard), so the encoded form is printable text:
//!
//! ```text
//! base64url( {"peer_addr":"...","file_hash":"...","file_name":"...","file_size":N} )
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE};
use serde::{Deserialize, Serialize};

/// Errors produced when a ticket cannot be decoded. All of them mean the
/// ticket is invalid.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("invalid ticket encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("invalid ticket contents: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid ticket: missing peer address")]
    MissingPeerAddr,

    #[error("invalid ticket: missing file hash")]
    MissingFileHash,
}

/// Where to find a shared file and what it should hash to.
///
/// Absent fields decode to their empty values and are then caught by
/// [`Ticket::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    /// Routing string understood by the peer substrate.
    pub peer_addr: String,
    /// Hex SHA-256 of the file contents.
    pub file_hash: String,
    /// Informational; the sender's Metadata frame is authoritative.
    pub file_name: String,
    /// Informational; the sender's Metadata frame is authoritative.
    pub file_size: u64,
}

impl Ticket {
    /// Encodes the ticket as URL-safe base64 text.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and an integer cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE.encode(json)
    }

    /// Decodes and validates a ticket. Surrounding whitespace is ignored.
    pub fn decode(encoded: &str) -> Result<Self, TicketError> {
        let json = URL_SAFE.decode(encoded.trim())?;
        let ticket: Ticket = serde_json::from_slice(&json)?;
        ticket.validate()?;
        Ok(ticket)
    }

    /// Checks the fields a receiver cannot work without.
    pub fn validate(&self) -> Result<(), TicketError> {
        if self.peer_addr.is_empty() {
            return Err(TicketError::MissingPeerAddr);
        }
        if self.file_hash.is_empty() {
            return Err(TicketError::MissingFileHash);
        }
        Ok(())
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Ticket {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticket::decode(s)
    }
}
