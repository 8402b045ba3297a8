//! Node identifiers.

use std::fmt;

use rand::Rng;

use crate::PeerError;

/// Random bytes behind a node id (rendered as 32 hex characters).
const NODE_ID_BYTES: usize = 16;

/// Length of a node id on the wire and in addresses.
pub const NODE_ID_LEN: usize = NODE_ID_BYTES * 2;

/// Identifies one running node, so an address names a specific process and
/// not whatever happens to listen on that port later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Generates a fresh id from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NODE_ID_BYTES];
        rand::thread_rng().fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parses a 32-character hex id. Uppercase input is normalized.
    pub fn parse(s: &str) -> Result<Self, PeerError> {
        if s.len() != NODE_ID_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PeerError::InvalidAddress(format!(
                "node id must be {NODE_ID_LEN} hex characters, got {s:?}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against a claimed id in constant time.
    pub fn matches(&self, claimed: &str) -> bool {
        if claimed.len() != self.0.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in claimed.bytes().zip(self.0.bytes()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
