use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::TunnelError;
use crate::utils::{base64_body, escape_html};

/// The local service's answer, sent back through the tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardResponse {
    /// Must match the request_id from the corresponding ForwardRequest
    pub request_id: String,

    /// HTTP status code (200, 404, 500, etc.)
    pub status_code: u16,

    /// Response headers as a map of header name to list of values
    #[serde(default)]
    pub response_headers: HashMap<String, Vec<String>>,

    /// Raw response body, Base64 on the wire
    #[serde(default, with = "base64_body")]
    pub response_body: Vec<u8>,

    /// Processing time in milliseconds (local service response time)
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl ForwardResponse {
    /// Create a new response without headers or body
    pub fn new(request_id: String, status_code: u16) -> Self {
        Self {
            request_id,
            status_code,
            response_headers: HashMap::new(),
            response_body: Vec::new(),
            processing_time_ms: 0,
        }
    }

    /// Synthesized HTML error response
    pub fn html(request_id: String, status_code: u16, body: String) -> Self {
        let mut response = Self::new(request_id, status_code);
        response.response_headers.insert(
            "content-type".to_string(),
            vec!["text/html; charset=utf-8".to_string()],
        );
        response.response_body = body.into_bytes();
        response
    }

    /// 502 sent by the forwarder when the local service cannot be reached
    pub fn bad_gateway(request_id: String, failure: &TunnelError) -> Self {
        let body = match failure {
            TunnelError::LocalConnectionFailure { port, reason } => format!(
                "<h1>502 Bad Gateway</h1><p>Could not connect to the local server on port {}.</p>\
                 <p>Error: {}</p>",
                port,
                escape_html(reason)
            ),
            other => format!(
                "<h1>502 Bad Gateway</h1><p>Error: {}</p>",
                escape_html(&other.to_string())
            ),
        };
        Self::html(request_id, 502, body)
    }

    /// Check if the response has a body
    pub fn has_body(&self) -> bool {
        !self.response_body.is_empty()
    }

    /// Check if the response is successful (2xx status code)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if the response is a server error (5xx status code)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }
}
