/// Deadline the relay waits for a forward_response before answering 504
pub const RELAY_RESPONSE_TIMEOUT_SECS: u64 = 30;

/// Forwarder-side timeout for the local service call (below the relay deadline)
pub const LOCAL_REQUEST_TIMEOUT_SECS: u64 = 29;

/// Default length of a generated routing key
pub const DEFAULT_ROUTING_KEY_LENGTH: usize = 7;

/// Shortest routing key length the relay accepts in its configuration
pub const MIN_ROUTING_KEY_LENGTH: usize = 4;

/// Longest routing key that still fits in one DNS label
pub const MAX_ROUTING_KEY_LENGTH: usize = 63;

/// Length of a generated request ID
pub const REQUEST_ID_LENGTH: usize = 16;

/// Local port recorded for a tunnel when start_tunnel omits it
pub const DEFAULT_TUNNEL_PORT: u16 = 80;

/// Path on the relay where tunnel clients open their WebSocket
pub const DEFAULT_TUNNEL_PATH: &str = "/_tunnel";

/// Heartbeat interval to keep the tunnel WebSocket alive (30 seconds)
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Maximum public request body size (2 MB)
pub const MAX_BODY_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Capacity of each connection's outbound message queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Minimum delay for exponential backoff reconnection (1 second)
pub const RECONNECT_MIN_DELAY_MS: u64 = 1000;

/// Maximum delay for exponential backoff reconnection (60 seconds)
pub const RECONNECT_MAX_DELAY_MS: u64 = 60000;

/// Multiplier for exponential backoff reconnection
pub const RECONNECT_MULTIPLIER: f64 = 2.0;

/// Headers the relay and forwarder never copy across the tunnel
pub const HOP_BY_HOP_HEADERS: [&str; 4] = [
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
];
