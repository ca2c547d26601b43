use serde::{Deserialize, Serialize};

/// One active client exposing one local port through the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    /// Public routing key (subdomain label or first path segment)
    pub routing_key: String,

    /// Relay-assigned ID of the owning WebSocket connection
    pub connection_id: String,

    /// Local port the client reported in start_tunnel
    pub local_port: u16,

    /// Public URL announced to the client
    pub public_url: String,

    /// Timestamp when the tunnel was created (Unix epoch seconds)
    pub created_at: i64,
}

impl Tunnel {
    /// Create a new tunnel record
    pub fn new(
        routing_key: String,
        connection_id: String,
        local_port: u16,
        public_url: String,
        created_at: i64,
    ) -> Self {
        Self {
            routing_key,
            connection_id,
            local_port,
            public_url,
            created_at,
        }
    }

    /// Seconds the tunnel has been open
    pub fn age_secs(&self, current_timestamp: i64) -> i64 {
        current_timestamp - self.created_at
    }
}
