//! TCP node.
//!
//! Listens on one TCP port, greets every incoming connection with the
//! handshake from [`crate::wire`], and hands accepted streams to the handler
//! registered for their protocol id. Outgoing streams dial the socket part of
//! a [`PeerAddr`] and present its node id.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, RwLock};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::wire::{self, HandshakeResponse, Hello};
use crate::{
    CONNECT_TIMEOUT, HANDSHAKE_TIMEOUT, NodeId, PeerAddr, PeerError, PeerFuture, PeerNetwork,
    PeerStream, StreamHandler,
};

type HandlerTable = Arc<RwLock<HashMap<String, Arc<dyn StreamHandler>>>>;

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address to bind (port 0 = OS-assigned).
    pub listen_addr: SocketAddr,
    /// IP to put in the advertised address instead of auto-detecting one.
    pub advertise_ip: Option<IpAddr>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            advertise_ip: None,
        }
    }
}

/// A peer reachable over plain TCP.
///
/// Dropping the node stops its accept loop; streams already handed to a
/// handler keep running.
pub struct TcpNode {
    id: NodeId,
    advertised: SocketAddr,
    handlers: HandlerTable,
    cancel: CancellationToken,
}

impl TcpNode {
    /// Binds the listener and starts accepting connections.
    pub async fn bind(config: NodeConfig) -> Result<Arc<Self>, PeerError> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let local = listener.local_addr()?;

        let ip = crate::net::advertised_ip(config.advertise_ip, local.ip());

        let node = Arc::new(Self {
            id: NodeId::generate(),
            advertised: SocketAddr::new(ip, local.port()),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
        });

        info!(%local, node_id = %node.id, "peer node listening");

        tokio::spawn(accept_loop(
            listener,
            node.id.clone(),
            Arc::clone(&node.handlers),
            node.cancel.clone(),
        ));

        Ok(node)
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The full address other peers dial.
    pub fn peer_addr(&self) -> PeerAddr {
        PeerAddr::new(self.advertised, self.id.clone())
    }

    /// Stops accepting connections.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!(node_id = %self.id, "peer node shutting down");
            self.cancel.cancel();
        }
    }

    async fn dial(&self, peer_addr: &str, protocol: &str) -> Result<PeerStream, PeerError> {
        let target = PeerAddr::parse(peer_addr)?;

        let mut stream = match tokio::time::timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect(target.socket),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(PeerError::Unreachable {
                    addr: target.socket.to_string(),
                    source,
                });
            }
            Err(_) => return Err(PeerError::Timeout("connect")),
        };
        stream.set_nodelay(true)?;

        let hello = Hello {
            node_id: target.node_id.to_string(),
            protocol: protocol.to_string(),
        };
        let response = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            wire::write_hello(&mut stream, &hello).await?;
            wire::read_response(&mut stream).await
        })
        .await
        .map_err(|_| PeerError::Timeout("handshake"))??;

        match response {
            HandshakeResponse::Accepted => {
                debug!(peer = %target, protocol, "stream opened");
                Ok(Box::new(stream))
            }
            HandshakeResponse::WrongNode => Err(PeerError::WrongPeer(target.to_string())),
            HandshakeResponse::NoHandler => Err(PeerError::ProtocolRejected(protocol.to_string())),
        }
    }
}

impl Drop for TcpNode {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl PeerNetwork for TcpNode {
    fn open_stream<'a>(
        &'a self,
        peer_addr: &'a str,
        protocol: &'a str,
    ) -> PeerFuture<'a, Result<PeerStream, PeerError>> {
        Box::pin(self.dial(peer_addr, protocol))
    }

    fn set_stream_handler(&self, protocol: &str, handler: Arc<dyn StreamHandler>) {
        if let Ok(mut table) = self.handlers.write() {
            table.insert(protocol.to_string(), handler);
        }
    }

    fn remove_stream_handler(&self, protocol: &str) {
        if let Ok(mut table) = self.handlers.write() {
            table.remove(protocol);
        }
    }

    fn local_addr(&self) -> Result<String, PeerError> {
        if self.cancel.is_cancelled() {
            return Err(PeerError::NotListening);
        }
        Ok(self.peer_addr().to_string())
    }

    fn shutdown(&self) {
        TcpNode::shutdown(self);
    }
}

async fn accept_loop(
    listener: TcpListener,
    id: NodeId,
    handlers: HandlerTable,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("accept loop stopped");
                break;
            }

            result = listener.accept() => {
                match result {
                    Ok((stream, remote)) => {
                        let id = id.clone();
                        let handlers = Arc::clone(&handlers);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &id, &handlers, &cancel).await {
                                warn!(%remote, "incoming connection rejected: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("accept error: {e}");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    id: &NodeId,
    handlers: &HandlerTable,
    cancel: &CancellationToken,
) -> Result<(), PeerError> {
    let hello = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PeerError::Cancelled),
        result = tokio::time::timeout(HANDSHAKE_TIMEOUT, wire::read_hello(&mut stream)) => {
            match result {
                Ok(Ok(hello)) => hello,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(PeerError::Timeout("handshake")),
            }
        }
    };

    if !id.matches(&hello.node_id) {
        wire::write_response(&mut stream, HandshakeResponse::WrongNode).await?;
        return Err(PeerError::WrongPeer(hello.node_id));
    }

    let handler = handlers
        .read()
        .ok()
        .and_then(|table| table.get(&hello.protocol).cloned());
    let Some(handler) = handler else {
        wire::write_response(&mut stream, HandshakeResponse::NoHandler).await?;
        return Err(PeerError::ProtocolRejected(hello.protocol));
    };

    wire::write_response(&mut stream, HandshakeResponse::Accepted).await?;
    stream.set_nodelay(true)?;
    debug!(protocol = %hello.protocol, "stream accepted");

    handler.handle(Box::new(stream)).await;
    Ok(())
}
