use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::base64_body;

/// An HTTP request forwarded from the public endpoint to the tunnel client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardRequest {
    /// Unique identifier to correlate request and response
    pub request_id: String,

    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: String,

    /// Request path including query string, as the local service should see it
    /// Example: "/api/v1/users?limit=10"
    pub path: String,

    /// HTTP headers as a map of header name to list of values (Host excluded)
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,

    /// Raw request body, Base64 on the wire
    #[serde(default, with = "base64_body")]
    pub body: Vec<u8>,

    /// Timestamp when the relay received the request (Unix epoch in milliseconds)
    #[serde(default)]
    pub timestamp: u64,
}

impl ForwardRequest {
    /// Create a new forward request without headers or body
    pub fn new(method: String, path: String, request_id: String, timestamp: u64) -> Self {
        Self {
            request_id,
            method,
            path,
            headers: HashMap::new(),
            body: Vec::new(),
            timestamp,
        }
    }

    /// Check if the request has a body
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}
