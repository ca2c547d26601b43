//! Forwarder configuration

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use http_relay_common::constants::{
    HEARTBEAT_INTERVAL_SECS, LOCAL_REQUEST_TIMEOUT_SECS, RECONNECT_MAX_DELAY_MS,
    RECONNECT_MIN_DELAY_MS, RECONNECT_MULTIPLIER,
};
use url::Url;

/// CLI arguments for the forwarder agent
#[derive(Parser, Debug)]
#[command(name = "hrf")]
#[command(about = "Expose a local HTTP server through a relay tunnel", long_about = None)]
#[command(version)]
pub struct Args {
    /// Local port to forward requests to
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Local host address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Relay tunnel endpoint
    #[arg(
        short,
        long,
        env = "HRF_SERVER",
        default_value = "ws://localhost:5000/_tunnel"
    )]
    pub server: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = LOCAL_REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,
}

/// Configuration for the forwarder
#[derive(Debug, Clone)]
pub struct Config {
    /// Local service port announced in start_tunnel
    pub local_port: u16,

    /// Local service address (e.g., "http://localhost:3000")
    pub local_address: String,

    /// Relay WebSocket endpoint URL
    pub server_url: String,

    /// Bound on connecting plus the start_tunnel handshake
    pub connect_timeout: Duration,

    /// Request timeout when calling local service
    pub request_timeout: Duration,

    /// Heartbeat interval
    pub heartbeat_interval: Duration,

    /// Reconnection strategy
    pub reconnect_config: ReconnectConfig,
}

/// Reconnection configuration with exponential backoff
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(RECONNECT_MIN_DELAY_MS),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            multiplier: RECONNECT_MULTIPLIER,
            max_attempts: None, // Infinite retries
        }
    }
}

impl ReconnectConfig {
    /// Delay to use after `current`, capped at `max_delay`
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::from_millis(
            ((current.as_millis() as f64 * self.multiplier).min(self.max_delay.as_millis() as f64))
                as u64,
        )
    }
}

impl Config {
    /// Configuration for forwarding `host:port` through the relay at `server_url`
    pub fn new(host: &str, port: u16, server_url: impl Into<String>) -> Self {
        Self {
            local_port: port,
            local_address: format!("http://{}:{}", host, port),
            server_url: server_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(LOCAL_REQUEST_TIMEOUT_SECS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            reconnect_config: ReconnectConfig::default(),
        }
    }

    pub fn from_args(args: Args) -> Result<Self> {
        let server = Url::parse(&args.server)?;
        if !matches!(server.scheme(), "ws" | "wss") {
            bail!(
                "Relay server URL must use ws:// or wss://, got {}://",
                server.scheme()
            );
        }

        let mut config = Self::new(&args.host, args.port, args.server);
        config.connect_timeout = Duration::from_secs(args.connect_timeout);
        config.request_timeout = Duration::from_secs(args.request_timeout);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> Args {
        Args {
            port: 8080,
            host: "localhost".to_string(),
            server: "ws://relay.test:5000/_tunnel".to_string(),
            verbose: false,
            connect_timeout: 10,
            request_timeout: 29,
        }
    }

    #[test]
    fn test_config_from_args() {
        let config = Config::from_args(sample_args()).unwrap();
        assert_eq!(config.local_port, 8080);
        assert_eq!(config.local_address, "http://localhost:8080");
        assert_eq!(config.server_url, "ws://relay.test:5000/_tunnel");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(29));
        assert_eq!(
            config.heartbeat_interval,
            Duration::from_secs(HEARTBEAT_INTERVAL_SECS)
        );
    }

    #[test]
    fn test_config_rejects_http_server_url() {
        let mut args = sample_args();
        args.server = "http://relay.test:5000".to_string();
        assert!(Config::from_args(args).is_err());

        let mut args = sample_args();
        args.server = "not a url".to_string();
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["hrf", "-p", "4000"]);
        assert_eq!(args.port, 4000);
        assert_eq!(args.host, "localhost");
        assert_eq!(args.request_timeout, LOCAL_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_reconnect_config_defaults() {
        let reconnect = ReconnectConfig::default();

        assert_eq!(
            reconnect.min_delay,
            Duration::from_millis(RECONNECT_MIN_DELAY_MS)
        );
        assert_eq!(
            reconnect.max_delay,
            Duration::from_millis(RECONNECT_MAX_DELAY_MS)
        );
        assert_eq!(reconnect.multiplier, RECONNECT_MULTIPLIER);
        assert_eq!(reconnect.max_attempts, None);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let reconnect = ReconnectConfig::default();

        assert_eq!(
            reconnect.next_delay(Duration::from_secs(1)),
            Duration::from_secs(2)
        );
        assert_eq!(
            reconnect.next_delay(Duration::from_secs(40)),
            Duration::from_secs(60)
        );
        assert_eq!(
            reconnect.next_delay(Duration::from_secs(60)),
            Duration::from_secs(60)
        );
    }
}
