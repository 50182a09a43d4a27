//! # relay
//!
//! Relay server binary. Loads settings, initializes logging and metrics,
//! and serves the HTTP/WebSocket relay until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::config::ServerConfig;
use relay_server::server::RelayServer;
use relay_settings::RelaySettings;

/// How long live sessions get to close after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Message relay server.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Message relay server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory served under `/static` (overrides settings).
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

/// Combine loaded settings with CLI flags. Flags win.
fn server_config(settings: &RelaySettings, cli: &Cli) -> ServerConfig {
    let server = &settings.server;
    ServerConfig {
        host: cli.host.clone().unwrap_or_else(|| server.host.clone()),
        port: cli.port.unwrap_or(server.port),
        poll_timeout_secs: server.poll_timeout_secs,
        outbound_queue_capacity: server.outbound_queue_capacity,
        ping_interval_secs: server.ping_interval_secs,
        max_message_size: server.max_message_size,
        static_dir: cli
            .static_dir
            .clone()
            .or_else(|| server.static_dir.as_ref().map(PathBuf::from)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first, the log level comes from them
    let settings = match &args.settings {
        Some(path) => relay_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => relay_settings::load_settings().context("Failed to load settings")?,
    };

    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    relay_core::logging::init_subscriber(level);

    let metrics_handle = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = server_config(&settings, &args);
    tracing::debug!(?config, "server config resolved");

    let server = RelayServer::new(config, metrics_handle);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    let report = server.stop(handle, SHUTDOWN_GRACE).await;
    tracing::info!(clean = report.is_clean(), "shutdown complete");
    Ok(())
}
