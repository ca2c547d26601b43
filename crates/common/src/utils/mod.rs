mod encoding;
mod headers;
mod html;
mod id;
mod time;

pub use encoding::{base64_body, decode_body, encode_body};
pub use headers::{headers_to_map, map_to_headers, strip_hop_by_hop, without_host};
pub use html::escape_html;
pub use id::{generate_connection_id, generate_request_id, generate_routing_key};
pub use time::{current_timestamp_millis, current_timestamp_secs};
