use http::StatusCode;
use thiserror::Error;

/// Error types for the HTTP relay system
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("No active tunnel for routing key '{0}'")]
    RoutingKeyNotFound(String),

    #[error("Timeout waiting for response from tunnel client")]
    GatewayTimeout,

    #[error("Could not connect to local service on port {port}: {reason}")]
    LocalConnectionFailure { port: u16, reason: String },

    #[error("Request ID already pending: {0}")]
    DuplicateRequestId(String),

    #[error("No pending request for ID: {0}")]
    StaleCorrelation(String),

    #[error("Tunnel client disconnected: {0}")]
    TransportDisconnect(String),

    #[error("Connection already owns tunnel '{0}'")]
    TunnelAlreadyExists(String),

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TunnelError {
    /// HTTP status used when this error ends a public request
    pub fn status_code(&self) -> StatusCode {
        match self {
            TunnelError::RoutingKeyNotFound(_) => StatusCode::NOT_FOUND,
            TunnelError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            TunnelError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            TunnelError::LocalConnectionFailure { .. }
            | TunnelError::TransportDisconnect(_)
            | TunnelError::ConnectionError(_)
            | TunnelError::WebSocketError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message is safe to show to a public caller
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            TunnelError::RoutingKeyNotFound(_)
                | TunnelError::GatewayTimeout
                | TunnelError::TransportDisconnect(_)
        )
    }
}

/// Type alias for Results using TunnelError
pub type Result<T> = std::result::Result<T, TunnelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TunnelError::RoutingKeyNotFound("zzz0000".to_string());
        assert_eq!(err.to_string(), "No active tunnel for routing key 'zzz0000'");

        let err = TunnelError::LocalConnectionFailure {
            port: 8080,
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("port 8080"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_err.is_err());

        let tunnel_err: TunnelError = json_err.unwrap_err().into();
        assert!(matches!(tunnel_err, TunnelError::SerializationError(_)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TunnelError::RoutingKeyNotFound("abc".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TunnelError::GatewayTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            TunnelError::TransportDisconnect("gone".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            TunnelError::InternalError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_are_not_public() {
        assert!(TunnelError::GatewayTimeout.is_public());
        assert!(!TunnelError::InternalError("lock poisoned".into()).is_public());
        assert!(!TunnelError::DuplicateRequestId("abc".into()).is_public());
    }
}
