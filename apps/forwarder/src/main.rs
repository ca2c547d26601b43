use anyhow::Result;
use clap::Parser;
use hrf::{Args, Config, ConnectionManager};
use http_relay_common::constants::RELAY_RESPONSE_TIMEOUT_SECS;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("HTTP Relay Forwarder v{}", env!("CARGO_PKG_VERSION"));
    info!("Local service: {}:{}", args.host, args.port);
    info!("Relay server: {}", args.server);

    if args.request_timeout >= RELAY_RESPONSE_TIMEOUT_SECS {
        warn!(
            "Request timeout {}s is not below the relay's default {}s deadline; \
             slow local responses will surface as 504",
            args.request_timeout, RELAY_RESPONSE_TIMEOUT_SECS
        );
    }

    let config = Config::from_args(args)?;
    let manager = ConnectionManager::new(config)?;

    // Run until interrupted
    tokio::select! {
        result = manager.run() => {
            error!("Connection manager exited: {:?}", result);
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down gracefully...");
        }
    }

    Ok(())
}
