//! Chatwire — WebSocket chat server
//!
//! Serves a static frontend and a WebSocket endpoint at `/ws`. Clients
//! exchange `{type, payload}` JSON events; the server keeps every
//! connection alive with pings and routes events to the chat handlers.
//!
//! Usage:
//!   chatwire                                  # Port 3000, assets from ./frontend
//!   chatwire --port 8080                      # Custom port
//!   chatwire --static-dir ./public            # Custom asset directory
//!   chatwire --heartbeat-timeout-ms 30000     # Slower heartbeat

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chatwire_server::Registry;
use chatwire_transport::{ConnectionConfig, TransportConfig, TransportServer};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chatwire", about = "Chatwire — WebSocket chat server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Directory of static assets served at `/`
    #[arg(long, default_value = "./frontend")]
    static_dir: PathBuf,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Milliseconds to wait for a pong before dropping a client
    #[arg(long, default_value = "10000", value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_timeout_ms: u64,

    /// Largest inbound message in bytes
    #[arg(long, default_value = "1024")]
    max_frame_bytes: usize,

    /// Allow cross-origin requests
    #[arg(long)]
    cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_path) = cli.log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let mut connection = ConnectionConfig::with_heartbeat_timeout(Duration::from_millis(
        cli.heartbeat_timeout_ms,
    ));
    connection.max_frame_bytes = cli.max_frame_bytes;

    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_connections: cli.max_connections,
        static_dir: Some(cli.static_dir.clone()),
        enable_cors: cli.cors,
        connection,
    };

    let registry = Registry::with_default_handlers();
    info!("Handlers: {}", registry.handler_types().join(", "));

    let mut transport = TransportServer::start(config, registry.clone())
        .await
        .context("Failed to start transport")?;

    info!(
        "Serving {} at http://{}",
        cli.static_dir.display(),
        transport.local_addr()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutting down...");
    registry.close_all();
    transport.stop().await;

    Ok(())
}
