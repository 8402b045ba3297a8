//! Peer addresses.
//!
//! A TCP node is addressed as `<ip>:<port>/<node-id>`, e.g.
//! `192.168.1.20:41234/9f86d081884c7d659a2feaa0c55ad015`. The socket part
//! routes the connection; the node id makes sure it reaches the node that
//! issued the address.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::{NodeId, PeerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddr {
    pub socket: SocketAddr,
    pub node_id: NodeId,
}

impl PeerAddr {
    pub fn new(socket: SocketAddr, node_id: NodeId) -> Self {
        Self { socket, node_id }
    }

    pub fn parse(s: &str) -> Result<Self, PeerError> {
        let (socket, node_id) = s
            .trim()
            .rsplit_once('/')
            .ok_or_else(|| PeerError::InvalidAddress(format!("missing node id in {s:?}")))?;
        let socket = socket
            .parse::<SocketAddr>()
            .map_err(|e| PeerError::InvalidAddress(format!("{socket:?}: {e}")))?;
        let node_id = NodeId::parse(node_id)?;
        Ok(Self { socket, node_id })
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.socket, self.node_id)
    }
}

impl FromStr for PeerAddr {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
