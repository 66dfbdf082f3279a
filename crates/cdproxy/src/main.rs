//! cdproxy - authenticated relay in front of the Consumer Direct partner API
//!
//! Main entry point: reads configuration from the environment, installs
//! logging and serves until Ctrl-C or SIGTERM.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use cdproxy_config::{ConfigError, RelayConfig};
use cdproxy_oauth::{ClientCredentialsConfig, ClientCredentialsTokenManager};
use cdproxy_server::{Server, ServerConfig};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// cdproxy - authenticated relay in front of the Consumer Direct partner API
///
/// Credentials and the shared secret are read from the environment
/// (CD_CLIENT_ID, CD_CLIENT_SECRET, INTERNAL_SHARED_SECRET and aliases).
#[derive(Parser, Debug)]
#[command(name = "cdproxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write JSON logs to a daily-rotated file in this directory
    #[arg(long, env = "CDPROXY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(&cli);

    let relay = match RelayConfig::from_env() {
        Ok(relay) => relay,
        Err(e) => {
            report_config_error(&e);
            anyhow::bail!("invalid configuration");
        }
    };

    let port = cli.port.unwrap_or(relay.port);
    let server_config =
        ServerConfig::from_relay(&relay).with_bind_address(SocketAddr::new(cli.bind, port));

    let tokens = ClientCredentialsTokenManager::new(ClientCredentialsConfig::from_relay(&relay))
        .context("failed to create token manager")?;

    info!(
        partner_base_url = %relay.partner_base_url,
        token_url = %relay.token_url,
        target_entity_configured = relay.target_entity.is_some(),
        "Configuration loaded"
    );

    let server = Server::new(server_config, Arc::new(tokens)).context("failed to create server")?;
    server
        .run(shutdown_signal())
        .await
        .context("server failed")?;

    Ok(())
}

/// Console (human-readable) logging, plus a rotating JSON file when
/// `--log-dir` is given. `RUST_LOG` overrides the console filter.
fn init_tracing(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let default_filter = if cli.verbose {
        "cdproxy=debug,cdproxy_server=debug,cdproxy_oauth=debug,cdproxy_config=debug,tower_http=debug,info"
    } else {
        "cdproxy=info,cdproxy_server=info,cdproxy_oauth=info,cdproxy_config=info,warn"
    };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "cdproxy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "cdproxy=trace,cdproxy_server=trace,cdproxy_oauth=trace,cdproxy_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(console_filter))
        .with(file_layer)
        .init();

    guard
}

/// Log which settings are wrong, by name only.
fn report_config_error(e: &ConfigError) {
    match e {
        ConfigError::MissingRequired(fields) => {
            for field in fields {
                error!(field = field.name, checked = %field.aliases.join(", "), "Missing required configuration");
            }
        }
        ConfigError::InvalidValue { .. } => error!(error = %e, "Invalid configuration"),
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
