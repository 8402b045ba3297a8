//! `send` and `receive` commands.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use sendme_peer::{NodeConfig, TcpNode};
use sendme_ticket::Ticket;
use sendme_transfer::{
    ProgressCallback, ReceiveOptions, ShareOptions, StreamOutcome, TransferProgress,
    format_file_size, format_speed, receive_file, start_share,
};

use crate::config::Config;

/// Minimum gap between progress log lines.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub struct SendArgs {
    pub file: PathBuf,
    pub port: Option<u16>,
    pub advertise_ip: Option<IpAddr>,
}

pub struct ReceiveArgs {
    pub ticket: String,
    pub output: Option<PathBuf>,
}

/// Shares a file until Ctrl-C.
pub async fn send(config: &Config, args: SendArgs) -> anyhow::Result<()> {
    let node = TcpNode::bind(NodeConfig {
        listen_addr: SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            args.port.unwrap_or(config.port),
        ),
        advertise_ip: args.advertise_ip.or(config.advertise_ip),
    })
    .await?;

    let completed = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&completed);
    let options = ShareOptions {
        on_progress: Some(throttled_progress("sent")),
        on_stream_end: Some(Arc::new(move |outcome: &StreamOutcome| {
            if let StreamOutcome::Completed { bytes } = outcome {
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!(
                    transfers = n,
                    size = %format_file_size(*bytes),
                    "receiver finished downloading"
                );
            }
        })),
    };

    let session = start_share(&args.file, node, options).await?;
    let ticket = session.ticket();

    println!(
        "Sharing {} ({})",
        ticket.file_name,
        format_file_size(ticket.file_size)
    );
    println!("To receive, run:\n\n    sendme receive {ticket}\n");
    println!("Press Ctrl-C to stop sharing.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = session.wait() => {}
    }

    session.stop();
    tracing::info!(
        transfers = completed.load(Ordering::Relaxed),
        "sharing finished"
    );
    Ok(())
}

/// Redeems a ticket. Ctrl-C cancels and removes the partial file.
pub async fn receive(config: &Config, args: ReceiveArgs) -> anyhow::Result<()> {
    let ticket = Ticket::decode(&args.ticket)?;
    println!(
        "Receiving {} ({})",
        ticket.file_name,
        format_file_size(ticket.file_size)
    );

    let node = TcpNode::bind(NodeConfig::default()).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, cancelling");
            on_signal.cancel();
        }
    });

    let options = ReceiveOptions {
        output: args.output.or_else(|| config.output_dir.clone()),
        on_progress: Some(throttled_progress("received")),
        cancel,
    };

    let result = receive_file(&ticket, node.as_ref(), options).await;
    node.shutdown();
    let report = result?;

    println!(
        "Saved {} ({})",
        report.path.display(),
        format_file_size(report.bytes)
    );
    Ok(())
}

/// Logs progress at most once per [`PROGRESS_INTERVAL`], plus the final update.
fn throttled_progress(verb: &'static str) -> ProgressCallback {
    let last = Mutex::new(None::<Instant>);
    Arc::new(move |p: TransferProgress| {
        let done = p.bytes_transferred >= p.total_bytes;
        if let Ok(mut last) = last.lock() {
            if !done && last.is_some_and(|t| t.elapsed() < PROGRESS_INTERVAL) {
                return;
            }
            *last = Some(Instant::now());
        }
        tracing::info!(
            progress = %p.percent(),
            speed = %format_speed(p.speed),
            "{verb} {} of {}",
            format_file_size(p.bytes_transferred),
            format_file_size(p.total_bytes),
        );
    })
}
