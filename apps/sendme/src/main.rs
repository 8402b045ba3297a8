//! sendme command-line entry point.

mod app;
mod config;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sendme")]
#[command(about = "Send a file directly to another machine", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share a file and print a ticket for the receiver
    Send {
        /// File to share
        file: PathBuf,

        /// Port to listen on (0 = auto-assign)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to put in the ticket
        #[arg(long)]
        advertise_ip: Option<IpAddr>,
    },
    /// Receive a file using a ticket
    Receive {
        /// Ticket printed by `sendme send`
        ticket: String,

        /// Output directory or file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("failed to load configuration, using defaults: {e}");
            config::Config::default()
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Send {
            file,
            port,
            advertise_ip,
        } => rt.block_on(app::send(
            &config,
            app::SendArgs {
                file,
                port,
                advertise_ip,
            },
        )),
        Commands::Receive { ticket, output } => {
            rt.block_on(app::receive(&config, app::ReceiveArgs { ticket, output }))
        }
    }
}
