//! Receiver session.
//!
//! [`receive_file`] redeems a ticket: it dials the sender, checks the
//! announced hash against the ticket, streams chunks to a freshly created
//! file while hashing them, and verifies the digest once Done arrives. A
//! failed receive never leaves a file at the destination.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sendme_peer::PeerNetwork;
use sendme_protocol::{FileMetadata, PROTOCOL_ID, receive_chunk, receive_metadata};
use sendme_ticket::Ticket;

use crate::TransferError;
use crate::progress::{ProgressCallback, ProgressReporter, format_file_size};
use crate::validation::resolve_destination;

/// Options for a receive.
#[derive(Clone, Default)]
pub struct ReceiveOptions {
    /// Existing directory to receive into, or the exact file path to write.
    /// `None` receives into the current directory.
    pub output: Option<PathBuf>,
    /// Called after every chunk.
    pub on_progress: Option<ProgressCallback>,
    /// Cancels the receive between frames.
    pub cancel: CancellationToken,
}

/// A completed, verified receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub file_hash: String,
}

/// Receives the file named by `ticket`.
pub async fn receive_file(
    ticket: &Ticket,
    network: &dyn PeerNetwork,
    options: ReceiveOptions,
) -> Result<ReceiveReport, TransferError> {
    ticket.validate()?;
    let cancel = options.cancel.clone();

    debug!(peer = %ticket.peer_addr, "connecting to sender");
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        result = network.open_stream(&ticket.peer_addr, PROTOCOL_ID) => result?,
    };

    let metadata = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        result = receive_metadata(&mut stream) => result?,
    };

    if metadata.file_hash != ticket.file_hash {
        return Err(TransferError::IntegrityMismatch {
            expected: ticket.file_hash.clone(),
            actual: metadata.file_hash,
        });
    }

    let dest = resolve_destination(options.output.as_deref(), &metadata.file_name)?;
    info!(
        file = %metadata.file_name,
        size = %format_file_size(metadata.file_size),
        dest = %dest.display(),
        "receiving file"
    );

    let file = create_destination(&dest).await?;
    let partial = PartialFile::new(dest.clone());

    let bytes = write_stream(
        &mut stream,
        file,
        &metadata,
        &cancel,
        options.on_progress.clone(),
    )
    .await?;

    partial.keep();
    info!(path = %dest.display(), bytes, "file received");

    Ok(ReceiveReport {
        path: dest,
        bytes,
        file_hash: metadata.file_hash,
    })
}

/// Creates `dest` and its parents. Fails if anything already exists there.
async fn create_destination(dest: &Path) -> Result<File, TransferError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    match OpenOptions::new().write(true).create_new(true).open(dest).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(TransferError::DestinationExists(dest.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Copies Chunk frames into `file` until Done, then verifies the digest.
///
/// Takes ownership of `file` so the handle is closed before the caller
/// decides whether to keep it.
async fn write_stream<S>(
    stream: &mut S,
    mut file: File,
    metadata: &FileMetadata,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<u64, TransferError>
where
    S: AsyncRead + Unpin,
{
    let reporter = ProgressReporter::new(metadata.file_size, progress);
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = receive_chunk(&mut *stream) => result?,
        };

        let Some(data) = chunk else {
            break;
        };
        file.write_all(&data).await?;
        hasher.update(&data);
        received += data.len() as u64;
        debug!(bytes = data.len(), total = received, "chunk received");
        reporter.report(received);
    }

    file.flush().await?;
    drop(file);

    let actual = hex::encode(hasher.finalize());
    if actual != metadata.file_hash {
        return Err(TransferError::IntegrityMismatch {
            expected: metadata.file_hash.clone(),
            actual,
        });
    }
    if received != metadata.file_size {
        warn!(
            declared = metadata.file_size,
            received, "size differs from metadata, content hash matches"
        );
    }

    Ok(received)
}

/// Removes the destination file on drop unless [`keep`](Self::keep) is called.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "failed to remove partial file: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use sendme_peer::{NodeConfig, PeerError, PeerStream, TcpNode};
    use sendme_protocol::{CHUNK_SIZE, Message, MessageKind, ProtocolError, write_frame};
    use tempfile::TempDir;

    use crate::checksum::checksum_bytes;
    use crate::progress::TransferProgress;
    use crate::sender::{ShareOptions, ShareSession, StreamOutcome, start_share};

    async fn loopback_node() -> Arc<TcpNode> {
        TcpNode::bind(NodeConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            advertise_ip: None,
        })
        .await
        .unwrap()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    async fn share(dir: &TempDir, name: &str, data: &[u8]) -> (ShareSession, Arc<TcpNode>) {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        let node = loopback_node().await;
        let session = start_share(&path, node.clone(), ShareOptions::default())
            .await
            .unwrap();
        (session, node)
    }

    /// A fake sender that writes `frames` on every stream and then closes it.
    async fn scripted_sender(frames: Vec<Message>) -> Arc<TcpNode> {
        let node = loopback_node().await;
        let frames = Arc::new(frames);
        node.set_stream_handler(
            PROTOCOL_ID,
            Arc::new(move |mut stream: PeerStream| {
                let frames = Arc::clone(&frames);
                async move {
                    for frame in frames.iter() {
                        if write_frame(&mut stream, frame).await.is_err() {
                            return;
                        }
                    }
                }
            }),
        );
        node
    }

    fn ticket_for(node: &TcpNode, data: &[u8], name: &str) -> Ticket {
        Ticket {
            peer_addr: node.local_addr().unwrap(),
            file_hash: checksum_bytes(data),
            file_name: name.into(),
            file_size: data.len() as u64,
        }
    }

    fn metadata_for(data: &[u8], name: &str) -> Message {
        Message::Metadata(FileMetadata {
            file_name: name.into(),
            file_size: data.len() as u64,
            file_hash: checksum_bytes(data),
        })
    }

    fn options_into(dir: &Path) -> ReceiveOptions {
        ReceiveOptions {
            output: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn end_to_end_transfer() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let data = pattern(CHUNK_SIZE * 2 + 12_345);
        let (session, _node) = share(&src, "payload.bin", &data).await;

        let client = loopback_node().await;
        let report = receive_file(session.ticket(), client.as_ref(), options_into(dst.path()))
            .await
            .unwrap();

        assert_eq!(report.path, dst.path().join("payload.bin"));
        assert_eq!(report.bytes, data.len() as u64);
        assert_eq!(report.file_hash, checksum_bytes(&data));
        assert_eq!(std::fs::read(&report.path).unwrap(), data);
        session.stop();
    }

    #[tokio::test]
    async fn end_to_end_empty_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let (session, _node) = share(&src, "empty.txt", b"").await;

        let client = loopback_node().await;
        let report = receive_file(session.ticket(), client.as_ref(), options_into(dst.path()))
            .await
            .unwrap();
        assert_eq!(report.bytes, 0);
        assert_eq!(std::fs::read(&report.path).unwrap(), b"");
        session.stop();
    }

    #[tokio::test]
    async fn explicit_output_path_is_used_exactly() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let (session, _node) = share(&src, "a.txt", b"contents").await;

        let target = dst.path().join("nested/dir/renamed.txt");
        let client = loopback_node().await;
        let report = receive_file(
            session.ticket(),
            client.as_ref(),
            ReceiveOptions {
                output: Some(target.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(report.path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"contents");
        session.stop();
    }

    #[tokio::test]
    async fn progress_reaches_total() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let data = pattern(CHUNK_SIZE + 1);
        let (session, _node) = share(&src, "p.bin", &data).await;

        let seen = Arc::new(Mutex::new(Vec::<TransferProgress>::new()));
        let sink = Arc::clone(&seen);
        let client = loopback_node().await;
        receive_file(
            session.ticket(),
            client.as_ref(),
            ReceiveOptions {
                output: Some(dst.path().to_path_buf()),
                on_progress: Some(Arc::new(move |p: TransferProgress| sink.lock().unwrap().push(p))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let last = seen.last().unwrap();
        assert_eq!(last.bytes_transferred, data.len() as u64);
        assert_eq!(last.percent(), "100.00%");
        session.stop();
    }

    #[tokio::test]
    async fn concurrent_receivers_get_identical_copies() {
        let src = TempDir::new().unwrap();
        let data = pattern(CHUNK_SIZE + 777);
        let path = src.path().join("shared.bin");
        std::fs::write(&path, &data).unwrap();

        let completed = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&completed);
        let node = loopback_node().await;
        let session = start_share(
            &path,
            node.clone(),
            ShareOptions {
                on_stream_end: Some(Arc::new(move |outcome: &StreamOutcome| {
                    if matches!(outcome, StreamOutcome::Completed { .. }) {
                        *counter.lock().unwrap() += 1;
                    }
                })),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let dst_a = TempDir::new().unwrap();
        let dst_b = TempDir::new().unwrap();
        let client_a = loopback_node().await;
        let client_b = loopback_node().await;
        let (a, b) = tokio::join!(
            receive_file(session.ticket(), client_a.as_ref(), options_into(dst_a.path())),
            receive_file(session.ticket(), client_b.as_ref(), options_into(dst_b.path())),
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(std::fs::read(&a.path).unwrap(), data);
        assert_eq!(std::fs::read(&b.path).unwrap(), data);
        assert_eq!(a.file_hash, b.file_hash);

        // The sender's handler finishes after the receiver has seen Done.
        for _ in 0..100 {
            if *completed.lock().unwrap() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(*completed.lock().unwrap(), 2);
        session.stop();
    }

    #[tokio::test]
    async fn stalled_and_dropped_receivers_do_not_block_others() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let data = pattern(CHUNK_SIZE * 8);
        let (session, _node) = share(&src, "big.bin", &data).await;
        let ticket = session.ticket().clone();

        // Reads the metadata, then never reads again.
        let stalled_client = loopback_node().await;
        let mut stalled = stalled_client
            .open_stream(&ticket.peer_addr, PROTOCOL_ID)
            .await
            .unwrap();
        let metadata = receive_metadata(&mut stalled).await.unwrap();
        assert_eq!(metadata.file_hash, ticket.file_hash);

        // Goes away after the first chunk.
        let dropping_client = loopback_node().await;
        let mut dropping = dropping_client
            .open_stream(&ticket.peer_addr, PROTOCOL_ID)
            .await
            .unwrap();
        receive_metadata(&mut dropping).await.unwrap();
        let first = receive_chunk(&mut dropping).await.unwrap().unwrap();
        assert_eq!(first.len(), CHUNK_SIZE);
        drop(dropping);

        let client = loopback_node().await;
        let report = tokio::time::timeout(
            std::time::Duration::from_secs(20),
            receive_file(&ticket, client.as_ref(), options_into(dst.path())),
        )
        .await
        .expect("healthy receiver stalled behind the others")
        .unwrap();

        assert_eq!(report.bytes, data.len() as u64);
        assert_eq!(std::fs::read(&report.path).unwrap(), data);

        drop(stalled);
        session.stop();
    }

    #[tokio::test]
    async fn metadata_hash_mismatch_creates_nothing() {
        let dst = TempDir::new().unwrap();
        let data = b"real contents";
        let sender = scripted_sender(vec![
            metadata_for(b"other contents", "file.txt"),
            Message::Chunk(data.to_vec()),
            Message::Done,
        ])
        .await;

        let client = loopback_node().await;
        let ticket = ticket_for(&sender, data, "file.txt");
        let err = receive_file(&ticket, client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::IntegrityMismatch { .. }));
        assert!(!dst.path().join("file.txt").exists());
    }

    #[tokio::test]
    async fn corrupted_chunk_deletes_file() {
        let dst = TempDir::new().unwrap();
        let data = b"the original bytes".to_vec();
        let mut corrupted = data.clone();
        corrupted[3] ^= 0xff;
        let sender = scripted_sender(vec![
            metadata_for(&data, "file.txt"),
            Message::Chunk(corrupted),
            Message::Done,
        ])
        .await;

        let client = loopback_node().await;
        let ticket = ticket_for(&sender, &data, "file.txt");
        let err = receive_file(&ticket, client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        match err {
            TransferError::IntegrityMismatch { expected, actual } => {
                assert_eq!(expected, checksum_bytes(&data));
                assert_ne!(actual, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dst.path().join("file.txt").exists());
    }

    #[tokio::test]
    async fn truncated_stream_leaves_no_file() {
        let dst = TempDir::new().unwrap();
        let data = pattern(300);
        let sender = scripted_sender(vec![
            metadata_for(&data, "file.bin"),
            Message::Chunk(data[..100].to_vec()),
            Message::Chunk(data[100..200].to_vec()),
        ])
        .await;

        let client = loopback_node().await;
        let ticket = ticket_for(&sender, &data, "file.bin");
        let err = receive_file(&ticket, client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Protocol(ProtocolError::Closed)));
        assert!(!dst.path().join("file.bin").exists());
    }

    #[tokio::test]
    async fn remote_error_frame() {
        let dst = TempDir::new().unwrap();
        let data = pattern(64);
        let sender = scripted_sender(vec![
            metadata_for(&data, "file.bin"),
            Message::Chunk(data[..32].to_vec()),
            Message::Error("failed to read file: disk on fire".into()),
        ])
        .await;

        let client = loopback_node().await;
        let ticket = ticket_for(&sender, &data, "file.bin");
        let err = receive_file(&ticket, client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        assert!(err.is_remote());
        assert!(
            matches!(&err, TransferError::Protocol(ProtocolError::Remote(m)) if m.contains("disk on fire"))
        );
        assert!(!dst.path().join("file.bin").exists());
    }

    #[tokio::test]
    async fn unexpected_frame_kind() {
        let dst = TempDir::new().unwrap();
        let data = pattern(10);
        let sender = scripted_sender(vec![
            metadata_for(&data, "file.bin"),
            metadata_for(&data, "file.bin"),
        ])
        .await;

        let client = loopback_node().await;
        let ticket = ticket_for(&sender, &data, "file.bin");
        let err = receive_file(&ticket, client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::Protocol(ProtocolError::UnexpectedMessage {
                expected: MessageKind::Chunk,
                actual: MessageKind::Metadata,
            })
        ));
        assert!(!dst.path().join("file.bin").exists());
    }

    #[tokio::test]
    async fn traversal_name_rejected() {
        let dst = TempDir::new().unwrap();
        let data = pattern(10);
        let sender = scripted_sender(vec![
            metadata_for(&data, "../escape.bin"),
            Message::Chunk(data.clone()),
            Message::Done,
        ])
        .await;

        let client = loopback_node().await;
        let ticket = ticket_for(&sender, &data, "escape.bin");
        let err = receive_file(&ticket, client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::InvalidPath(_)));
        assert!(!dst.path().parent().unwrap().join("escape.bin").exists());
    }

    #[tokio::test]
    async fn existing_destination_untouched() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let (session, _node) = share(&src, "clash.txt", b"new contents").await;

        let existing = dst.path().join("clash.txt");
        std::fs::write(&existing, b"keep me").unwrap();

        let client = loopback_node().await;
        let err = receive_file(session.ticket(), client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::DestinationExists(p) if p == existing));
        assert_eq!(std::fs::read(&existing).unwrap(), b"keep me");
        session.stop();
    }

    #[tokio::test]
    async fn invalid_ticket_fails_before_connecting() {
        let client = loopback_node().await;
        let ticket = Ticket {
            file_hash: "abc".into(),
            ..Default::default()
        };
        let err = receive_file(&ticket, client.as_ref(), ReceiveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Ticket(_)));
    }

    #[tokio::test]
    async fn stopped_sender_is_unreachable() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let (session, _node) = share(&src, "a.txt", b"abc").await;
        session.stop();
        // Let the accept loop observe the cancellation and drop the listener.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = loopback_node().await;
        let err = receive_file(session.ticket(), client.as_ref(), options_into(dst.path()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Connect(PeerError::Unreachable { .. } | PeerError::ProtocolRejected(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_receive() {
        let dst = TempDir::new().unwrap();
        let data = pattern(10);
        // Metadata only; the receiver then waits for a chunk that never comes.
        let node = loopback_node().await;
        let metadata = metadata_for(&data, "slow.bin");
        node.set_stream_handler(
            PROTOCOL_ID,
            Arc::new(move |mut stream: PeerStream| {
                let metadata = metadata.clone();
                async move {
                    let _ = write_frame(&mut stream, &metadata).await;
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let client = loopback_node().await;
        let ticket = ticket_for(&node, &data, "slow.bin");
        let err = receive_file(
            &ticket,
            client.as_ref(),
            ReceiveOptions {
                output: Some(dst.path().to_path_buf()),
                cancel,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TransferError::Cancelled));
        assert!(!dst.path().join("slow.bin").exists());
    }
}
