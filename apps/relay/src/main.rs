//! Relay server binary
//!
//! Serves the public HTTP endpoint and the tunnel WebSocket endpoint on one listener.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use http_relay_common::constants::{
    DEFAULT_ROUTING_KEY_LENGTH, DEFAULT_TUNNEL_PATH, MAX_BODY_SIZE_BYTES, MAX_ROUTING_KEY_LENGTH,
    MIN_ROUTING_KEY_LENGTH, RELAY_RESPONSE_TIMEOUT_SECS,
};
use http_relay_server::{AppState, RelayConfig, RoutingMode, build_router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments for the relay server
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Public HTTP relay for reverse tunnels", long_about = None)]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Public base domain (tunnels become subdomains of it)
    #[arg(long, env = "RELAY_BASE_DOMAIN", default_value = "localhost")]
    base_domain: String,

    /// How public requests select a tunnel
    #[arg(
        long,
        env = "RELAY_ROUTING_MODE",
        value_enum,
        default_value_t = RoutingMode::Subdomain
    )]
    routing_mode: RoutingMode,

    /// Scheme used in announced public URLs
    #[arg(long, default_value = "http")]
    public_scheme: String,

    /// Path of the tunnel WebSocket endpoint
    #[arg(long, default_value = DEFAULT_TUNNEL_PATH)]
    tunnel_path: String,

    /// Seconds a public request waits for the tunnel client's response
    #[arg(long, default_value_t = RELAY_RESPONSE_TIMEOUT_SECS)]
    response_timeout: u64,

    /// Length of generated routing keys
    #[arg(long, default_value_t = DEFAULT_ROUTING_KEY_LENGTH)]
    key_length: usize,

    /// Maximum public request body size in bytes
    #[arg(long, default_value_t = MAX_BODY_SIZE_BYTES)]
    max_body_size: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<RelayConfig> {
        ensure!(
            self.key_length >= MIN_ROUTING_KEY_LENGTH,
            "--key-length must be at least {}",
            MIN_ROUTING_KEY_LENGTH
        );
        ensure!(
            self.key_length <= MAX_ROUTING_KEY_LENGTH,
            "--key-length must be at most {}",
            MAX_ROUTING_KEY_LENGTH
        );
        ensure!(
            self.tunnel_path.starts_with('/'),
            "--tunnel-path must start with '/'"
        );
        ensure!(self.response_timeout > 0, "--response-timeout must be positive");

        Ok(RelayConfig {
            base_domain: self.base_domain,
            routing_mode: self.routing_mode,
            public_scheme: self.public_scheme,
            tunnel_path: self.tunnel_path,
            response_timeout: Duration::from_secs(self.response_timeout),
            routing_key_length: self.key_length,
            max_body_size: self.max_body_size,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let bind = args.bind;
    let config = args.into_config()?;

    info!("HTTP Relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Base domain: {} ({:?} routing)", config.base_domain, config.routing_mode);
    info!("Tunnel endpoint: {}", config.tunnel_path);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on {}", bind);

    let app = build_router(AppState::new(config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Relay server failed")?;

    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, shutting down gracefully...");
    }
}
