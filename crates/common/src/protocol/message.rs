use serde::{Deserialize, Serialize};

use super::{ForwardRequest, ForwardResponse};

/// All tunnel WebSocket messages are wrapped in this typed envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Control plane messages
    Ping,
    Pong,

    /// Tunnel lifecycle
    StartTunnel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },
    TunnelCreated {
        url: String,
        #[serde(default)]
        routing_key: String,
    },
    CloseTunnel,
    TunnelClosed {
        routing_key: String,
    },

    /// Data plane messages
    ForwardRequest(ForwardRequest),
    ForwardResponse(ForwardResponse),

    /// Error handling
    Error {
        #[serde(default)]
        request_id: Option<String>,
        code: ErrorCode,
        message: String,
    },
}

impl Message {
    /// Serialize into the JSON text carried by one WebSocket frame
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse one WebSocket text frame
    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            crate::TunnelError::InvalidMessage(format!("Failed to parse message: {}", e))
        })
    }
}

/// Error codes for tunnel operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    Timeout,
    LocalServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Status the relay answers with when a client reports this error for a request
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Timeout => 504,
            ErrorCode::LocalServiceUnavailable => 502,
            ErrorCode::InternalError => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ping_pong_serialization() {
        let ping = Message::Ping;
        let json = ping.to_json().unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let parsed = Message::from_json(r#"{"type":"pong"}"#).unwrap();
        assert!(matches!(parsed, Message::Pong));
    }

    #[test]
    fn test_start_tunnel_serialization() {
        let msg = Message::StartTunnel { port: Some(8080) };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"start_tunnel","port":8080}"#);

        // Port is optional on the wire
        let parsed = Message::from_json(r#"{"type":"start_tunnel"}"#).unwrap();
        assert!(matches!(parsed, Message::StartTunnel { port: None }));
    }

    #[test]
    fn test_tunnel_created_serialization() {
        let msg = Message::TunnelCreated {
            url: "http://ab3x9fz.relay.example.com".to_string(),
            routing_key: "ab3x9fz".to_string(),
        };

        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"tunnel_created"#));
        assert!(json.contains(r#""url":"http://ab3x9fz.relay.example.com"#));

        // Older relays only send the URL
        let parsed =
            Message::from_json(r#"{"type":"tunnel_created","url":"http://x.example.com"}"#)
                .unwrap();
        match parsed {
            Message::TunnelCreated { url, routing_key } => {
                assert_eq!(url, "http://x.example.com");
                assert!(routing_key.is_empty());
            }
            _ => panic!("Expected TunnelCreated"),
        }
    }

    #[test]
    fn test_forward_request_serialization() {
        let request = ForwardRequest {
            request_id: "k3j4h5g6f7d8s9a0".to_string(),
            method: "GET".to_string(),
            path: "/api/v1/users".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            timestamp: 1234567890,
        };

        let msg = Message::ForwardRequest(request);
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"forward_request"#));
        assert!(json.contains(r#""request_id":"k3j4h5g6f7d8s9a0"#));

        let parsed = Message::from_json(&json).unwrap();
        assert!(matches!(parsed, Message::ForwardRequest(_)));
    }

    #[test]
    fn test_close_tunnel_serialization() {
        let json = Message::CloseTunnel.to_json().unwrap();
        assert_eq!(json, r#"{"type":"close_tunnel"}"#);

        let parsed =
            Message::from_json(r#"{"type":"tunnel_closed","routing_key":"ab3x9fz"}"#).unwrap();
        assert!(matches!(parsed, Message::TunnelClosed { routing_key } if routing_key == "ab3x9fz"));
    }

    #[test]
    fn test_error_serialization() {
        let msg = Message::Error {
            request_id: Some("k3j4h5g6f7d8s9a0".to_string()),
            code: ErrorCode::Timeout,
            message: "Request timed out".to_string(),
        };

        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"error"#));
        assert!(json.contains(r#""code":"timeout"#));
        assert!(json.contains(r#""message":"Request timed out"#));

        let parsed = Message::from_json(&json).unwrap();
        match parsed {
            Message::Error { code, .. } => assert_eq!(code, ErrorCode::Timeout),
            _ => panic!("Expected Error"),
        }
    }

    #[test]
    fn test_error_code_to_status_code() {
        let codes = vec![
            (ErrorCode::InvalidRequest, "invalid_request", 400),
            (ErrorCode::Timeout, "timeout", 504),
            (ErrorCode::LocalServiceUnavailable, "local_service_unavailable", 502),
            (ErrorCode::InternalError, "internal_error", 502),
        ];

        for (code, expected_json, expected_status) in codes {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!(r#""{}""#, expected_json));
            assert_eq!(code.status_code(), expected_status);
        }
    }

    #[test]
    fn test_unknown_message_type_is_invalid() {
        let err = Message::from_json(r#"{"type":"teleport"}"#).unwrap_err();
        assert!(matches!(err, crate::TunnelError::InvalidMessage(_)));
    }
}
