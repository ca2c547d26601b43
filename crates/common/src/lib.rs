//! Common utilities and types for the HTTP relay system
//!
//! This crate provides the tunnel wire protocol, shared data structures and helpers
//! used by both the relay server and the forwarder (client agent).

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod utils;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::{Result, TunnelError};
pub use models::{PendingRequest, Tunnel};
pub use protocol::{ErrorCode, ForwardRequest, ForwardResponse, Message};
pub use utils::{
    current_timestamp_millis, current_timestamp_secs, decode_body, encode_body, escape_html,
    generate_connection_id, generate_request_id, generate_routing_key, headers_to_map,
    map_to_headers, strip_hop_by_hop, without_host,
};
