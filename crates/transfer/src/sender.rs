//! Sender session.
//!
//! [`start_share`] hashes the file once, publishes a ticket and registers a
//! stream handler. Every stream a receiver opens gets its own full replay of
//! the file: Metadata, Chunk frames of [`CHUNK_SIZE`] bytes, then Done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use sendme_peer::{PeerFuture, PeerNetwork, PeerStream, StreamHandler};
use sendme_protocol::{
    CHUNK_SIZE, FileMetadata, PROTOCOL_ID, send_chunk, send_done, send_error, send_metadata,
};
use sendme_ticket::Ticket;

use crate::checksum::hash_file;
use crate::progress::{ProgressCallback, ProgressReporter, format_file_size};
use crate::TransferError;

/// Callback invoked when a stream finishes, whatever the outcome.
pub type StreamEndCallback = Arc<dyn Fn(&StreamOutcome) + Send + Sync>;

/// Optional hooks for a share.
#[derive(Clone, Default)]
pub struct ShareOptions {
    /// Called after every chunk, per stream.
    pub on_progress: Option<ProgressCallback>,
    /// Called once per stream when it ends.
    pub on_stream_end: Option<StreamEndCallback>,
}

/// What every stream handler serves. Fixed once sharing starts.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub path: PathBuf,
    pub metadata: FileMetadata,
}

/// How a single stream ended. Never affects the share itself.
#[derive(Debug)]
pub enum StreamOutcome {
    Completed { bytes: u64 },
    Failed(TransferError),
    Cancelled,
}

/// A running share. Dropping it does not stop sharing; call [`stop`](Self::stop).
pub struct ShareSession {
    ticket: Ticket,
    config: Arc<ShareConfig>,
    network: Arc<dyn PeerNetwork>,
    cancel: CancellationToken,
}

/// Starts sharing `path` over `network`.
///
/// Fails if the path is missing or is not a regular file, if hashing fails,
/// or if the substrate cannot report its address.
pub async fn start_share(
    path: impl AsRef<Path>,
    network: Arc<dyn PeerNetwork>,
    options: ShareOptions,
) -> Result<ShareSession, TransferError> {
    let path = path.as_ref().to_path_buf();

    let file_meta = tokio::fs::metadata(&path).await?;
    if !file_meta.is_file() {
        return Err(TransferError::NotAFile(path));
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::NotAFile(path.clone()))?;
    let file_size = file_meta.len();

    debug!(path = %path.display(), size = file_size, "hashing file");
    let file_hash = hash_file(path.clone()).await?;

    let peer_addr = network
        .local_addr()
        .map_err(TransferError::LocalAddress)?;

    let ticket = Ticket {
        peer_addr,
        file_hash: file_hash.clone(),
        file_name: file_name.clone(),
        file_size,
    };
    let config = Arc::new(ShareConfig {
        path,
        metadata: FileMetadata {
            file_name,
            file_size,
            file_hash,
        },
    });
    let cancel = CancellationToken::new();

    let handler = ShareHandler {
        config: Arc::clone(&config),
        cancel: cancel.clone(),
        options,
    };
    network.set_stream_handler(PROTOCOL_ID, Arc::new(handler));

    info!(
        file = %config.metadata.file_name,
        size = %format_file_size(file_size),
        hash = %config.metadata.file_hash,
        "sharing started"
    );

    Ok(ShareSession {
        ticket,
        config,
        network,
        cancel,
    })
}

impl ShareSession {
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn config(&self) -> &ShareConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops sharing: in-flight streams stop before their next chunk, no new
    /// streams are accepted, and the node shuts down.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.network.remove_stream_handler(PROTOCOL_ID);
        self.network.shutdown();
        info!(file = %self.config.metadata.file_name, "sharing stopped");
    }

    /// Resolves once the session is stopped.
    pub async fn wait(&self) {
        self.cancel.cancelled().await;
    }
}

struct ShareHandler {
    config: Arc<ShareConfig>,
    cancel: CancellationToken,
    options: ShareOptions,
}

impl StreamHandler for ShareHandler {
    fn handle(&self, stream: PeerStream) -> PeerFuture<'_, ()> {
        let stream_id = Uuid::new_v4();
        let span = info_span!("stream", id = %stream_id);

        Box::pin(
            async move {
                info!("receiver connected");
                let outcome = serve_stream(
                    &self.config,
                    stream,
                    &self.cancel,
                    self.options.on_progress.clone(),
                )
                .await;

                match &outcome {
                    StreamOutcome::Completed { bytes } => {
                        info!(bytes, "file transfer completed");
                    }
                    StreamOutcome::Failed(e) => warn!("file transfer failed: {e}"),
                    StreamOutcome::Cancelled => info!("file transfer cancelled"),
                }

                if let Some(cb) = &self.options.on_stream_end {
                    cb(&outcome);
                }
            }
            .instrument(span),
        )
    }
}

/// Serves one full replay of the shared file on `stream`.
pub(crate) async fn serve_stream<S>(
    config: &ShareConfig,
    mut stream: S,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> StreamOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match send_file(config, &mut stream, cancel, progress).await {
        Ok(bytes) => StreamOutcome::Completed { bytes },
        Err(TransferError::Cancelled) => StreamOutcome::Cancelled,
        Err(e) => StreamOutcome::Failed(e),
    }
}

async fn send_file<S>(
    config: &ShareConfig,
    stream: &mut S,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<u64, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_metadata(stream, &config.metadata).await?;

    let mut file = match File::open(&config.path).await {
        Ok(file) => file,
        Err(e) => {
            let _ = send_error(stream, &format!("failed to open file: {e}")).await;
            return Err(e.into());
        }
    };

    let reporter = ProgressReporter::new(config.metadata.file_size, progress);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let n = match read_chunk(&mut file, &mut buf).await {
            Ok(n) => n,
            Err(e) => {
                let _ = send_error(stream, &format!("failed to read file: {e}")).await;
                return Err(e.into());
            }
        };
        if n == 0 {
            break;
        }

        send_chunk(stream, &buf[..n]).await?;
        sent += n as u64;
        debug!(bytes = n, total = sent, "chunk sent");
        reporter.report(sent);
    }

    send_done(stream).await?;
    Ok(sent)
}

/// Fills `buf` from `file`, short only at EOF.
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
