//! Party Mix terminal client entry point.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use partymix_cli::{CliError, Runtime, TerminalDriver};
use partymix_client::{Client, ClientConfig, FileStorage};
use partymix_core::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
    ReconnectPolicy, SystemEnv,
};
use tracing_subscriber::EnvFilter;

/// Party Mix terminal client
#[derive(Parser, Debug)]
#[command(name = "partymix")]
#[command(about = "Join a Party Mix room, queue tracks, and vote to skip from the terminal")]
#[command(version)]
struct Args {
    /// Directory for the client id and room code
    ///
    /// Defaults to `partymix` under the platform config directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Automatic reconnect attempts before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,

    /// Seconds between reconnect attempts
    #[arg(long, default_value_t = DEFAULT_RECONNECT_DELAY.as_secs())]
    reconnect_delay_secs: u64,

    /// Seconds to wait for the server handshake before retrying
    #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT.as_secs())]
    handshake_timeout_secs: u64,

    /// Log filter, e.g. `partymix=debug` (overrides `RUST_LOG`)
    #[arg(long)]
    log: Option<String>,
}

fn init_tracing(directive: Option<&str>) -> Result<(), CliError> {
    let filter = match directive {
        Some(directive) => {
            EnvFilter::try_new(directive).map_err(|e| CliError::LogFilter(e.to_string()))?
        },
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("partymix=info")),
    };

    // stdout carries the session view, so logs go to stderr.
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    Ok(())
}

fn open_storage(data_dir: Option<PathBuf>) -> Result<FileStorage, CliError> {
    match data_dir {
        Some(dir) => Ok(FileStorage::new(dir)),
        None => Ok(FileStorage::platform_default()?),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    // The WebSocket transport uses rustls without a built-in provider.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = ClientConfig {
        reconnect: ReconnectPolicy::fixed(
            args.max_reconnect_attempts,
            Duration::from_secs(args.reconnect_delay_secs),
        ),
        handshake_timeout: Duration::from_secs(args.handshake_timeout_secs),
        ..ClientConfig::default()
    };
    let storage = open_storage(args.data_dir)?;
    tracing::info!(server = %config.server_url, data_dir = %storage.root().display(), "starting");

    let client = Client::new(SystemEnv::new(), storage, config)?;
    Runtime::new(TerminalDriver::stdio(), client).run().await?;
    Ok(())
}
