//! Error types for the peer substrate.

/// Errors produced by the peer substrate.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("peer unreachable at {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("peer at {0} is a different node")]
    WrongPeer(String),

    #[error("peer does not accept protocol {0}")]
    ProtocolRejected(String),

    #[error("node is not listening")]
    NotListening,

    #[error("cancelled")]
    Cancelled,

    #[error("handshake error: {0}")]
    Handshake(String),
}
