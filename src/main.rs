//! Realtime WebSocket relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!                   │                 REALTIME RELAY                │
//!                   │                                               │
//!   Local client    │  ┌─────────┐   ┌─────────┐   ┌────────────┐  │   Upstream
//!   ◀──────────────▶│  │  http   │──▶│ inbound │──▶│  session   │◀─┼──────────▶
//!   (no auth)       │  │ server  │   │ upgrade │   │ two pumps  │  │  (Bearer key)
//!                   │  └─────────┘   └─────────┘   └────────────┘  │
//!                   │                                               │
//!                   │  config · observability · lifecycle           │
//!                   └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use realtime_relay::config::{loader, ProxyConfig};
use realtime_relay::http::HttpServer;
use realtime_relay::lifecycle::{signals, Shutdown};
use realtime_relay::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "realtime-relay")]
#[command(about = "Relay local WebSocket clients to an authenticated realtime API", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Credential sent upstream as a Bearer token
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Listen port (host part comes from the config bind address)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Upstream WebSocket endpoint
    #[arg(long, env = "RELAY_UPSTREAM_URL")]
    upstream_url: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(api_key) = self.api_key {
            config.upstream.api_key = api_key;
        }
        if let Some(port) = self.port {
            config.listener.bind_address = with_port(&config.listener.bind_address, port);
        }
        if let Some(endpoint) = self.upstream_url {
            config.upstream.endpoint = endpoint;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

/// Replace the port of a `host:port` bind address.
fn with_port(bind_address: &str, port: u16) -> String {
    let host = bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(bind_address);
    format!("{host}:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env must be loaded before clap reads the environment.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => loader::read_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    let config = loader::finalize(config)?;

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "realtime-relay starting"
    );
    if let Err(e) = dotenv {
        tracing::debug!(error = %e, "No .env file loaded");
    }

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("TLS crypto provider already installed");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.listener.path,
        upstream = %config.upstream.endpoint,
        connect_timeout_secs = config.timeouts.connect_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signals::shutdown_signal().await;
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(config);
    server.run(listener, stopped).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
