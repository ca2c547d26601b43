//! Relay configuration
//!
//! Built from command-line arguments in `main`; tests construct it directly.

use std::time::Duration;

use http_relay_common::constants::{
    DEFAULT_ROUTING_KEY_LENGTH, DEFAULT_TUNNEL_PATH, MAX_BODY_SIZE_BYTES,
    RELAY_RESPONSE_TIMEOUT_SECS,
};

/// How the relay derives a routing key from a public request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RoutingMode {
    /// `{key}.{base_domain}`; the path is forwarded unchanged
    #[default]
    Subdomain,
    /// `{base_domain}/{key}/...`; the key segment is stripped before forwarding
    Path,
}

/// Runtime configuration for the relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Public domain the relay serves, optionally with a port (e.g. "localhost:5000")
    pub base_domain: String,

    /// Routing key derivation strategy
    pub routing_mode: RoutingMode,

    /// Scheme used when announcing public URLs
    pub public_scheme: String,

    /// Path where tunnel clients open their WebSocket
    pub tunnel_path: String,

    /// How long a public request waits for the client's forward_response
    pub response_timeout: Duration,

    /// Length of generated routing keys
    pub routing_key_length: usize,

    /// Maximum accepted public request body
    pub max_body_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_domain: "localhost".to_string(),
            routing_mode: RoutingMode::Subdomain,
            public_scheme: "http".to_string(),
            tunnel_path: DEFAULT_TUNNEL_PATH.to_string(),
            response_timeout: Duration::from_secs(RELAY_RESPONSE_TIMEOUT_SECS),
            routing_key_length: DEFAULT_ROUTING_KEY_LENGTH,
            max_body_size: MAX_BODY_SIZE_BYTES,
        }
    }
}

impl RelayConfig {
    /// Base domain without any port, lowercased
    pub fn base_hostname(&self) -> String {
        strip_port(&self.base_domain).to_ascii_lowercase()
    }

    /// Public URL announced for a freshly created tunnel
    ///
    /// In path mode the host the client connected through is preferred so the URL
    /// is reachable the same way the relay was.
    pub fn public_url(&self, routing_key: &str, request_host: Option<&str>) -> String {
        match self.routing_mode {
            RoutingMode::Subdomain => {
                format!("{}://{}.{}", self.public_scheme, routing_key, self.base_domain)
            }
            RoutingMode::Path => {
                let host = request_host.unwrap_or(&self.base_domain);
                format!("{}://{}/{}", self.public_scheme, host, routing_key)
            }
        }
    }
}

/// Drop the `:port` suffix of a Host header value (IPv6 literals keep their brackets)
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split_once(':').map(|(name, _)| name).unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.routing_mode, RoutingMode::Subdomain);
        assert_eq!(config.tunnel_path, "/_tunnel");
        assert_eq!(config.response_timeout, Duration::from_secs(30));
        assert_eq!(config.routing_key_length, 7);
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("ab3x9fz.relay.test:5000"), "ab3x9fz.relay.test");
        assert_eq!(strip_port("relay.test"), "relay.test");
        assert_eq!(strip_port("[::1]:5000"), "[::1]");
    }

    #[test]
    fn test_base_hostname_ignores_port_and_case() {
        let config = RelayConfig {
            base_domain: "Relay.Test:5000".to_string(),
            ..Default::default()
        };
        assert_eq!(config.base_hostname(), "relay.test");
    }

    #[test]
    fn test_public_url_subdomain_mode() {
        let config = RelayConfig {
            base_domain: "mbsa.in".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.public_url("ab3x9fz", Some("ignored.example")),
            "http://ab3x9fz.mbsa.in"
        );
    }

    #[test]
    fn test_public_url_path_mode() {
        let config = RelayConfig {
            base_domain: "relay.test".to_string(),
            routing_mode: RoutingMode::Path,
            public_scheme: "https".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.public_url("ab3x9fz", Some("127.0.0.1:5000")),
            "https://127.0.0.1:5000/ab3x9fz"
        );
        assert_eq!(config.public_url("ab3x9fz", None), "https://relay.test/ab3x9fz");
    }
}
