//! Peer substrate for sendme.
//!
//! The transfer core only needs three things from the network: open a
//! reliable ordered byte stream to a named peer, accept incoming streams
//! tagged with a protocol id, and report an address others can reach us at.
//! [`PeerNetwork`] is that contract; [`TcpNode`] implements it over plain TCP
//! with a small handshake (see [`wire`]).

pub mod addr;
pub mod error;
mod net;
pub mod node;
pub mod node_id;
pub mod wire;

pub use addr::PeerAddr;
pub use error::PeerError;
pub use node::{NodeConfig, TcpNode};
pub use node_id::NodeId;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

/// Timeout for establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the protocol handshake on a fresh connection.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A boxed future returned by substrate and handler methods.
pub type PeerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reliable, ordered, bidirectional byte stream.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// A stream handed out by the substrate.
pub type PeerStream = Box<dyn ByteStream>;

/// Receives incoming streams for one protocol id.
///
/// Every accepted stream gets its own task, so `handle` may run concurrently
/// with itself.
pub trait StreamHandler: Send + Sync + 'static {
    fn handle(&self, stream: PeerStream) -> PeerFuture<'_, ()>;
}

impl<F, Fut> StreamHandler for F
where
    F: Fn(PeerStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, stream: PeerStream) -> PeerFuture<'_, ()> {
        Box::pin(self(stream))
    }
}

/// The contract the transfer core consumes.
pub trait PeerNetwork: Send + Sync {
    /// Opens a stream to `peer_addr`, tagged with `protocol`.
    fn open_stream<'a>(
        &'a self,
        peer_addr: &'a str,
        protocol: &'a str,
    ) -> PeerFuture<'a, Result<PeerStream, PeerError>>;

    /// Routes incoming streams tagged with `protocol` to `handler`,
    /// replacing any previous handler for it.
    fn set_stream_handler(&self, protocol: &str, handler: Arc<dyn StreamHandler>);

    /// Stops routing `protocol`; later streams for it are rejected.
    fn remove_stream_handler(&self, protocol: &str);

    /// Address other peers can use to reach this one.
    fn local_addr(&self) -> Result<String, PeerError>;

    /// Stops accepting incoming streams. Open streams are not interrupted.
    fn shutdown(&self);
}
