//! Error pages and sanitization
//!
//! Public callers see a small HTML page per failure. Errors outside the public
//! taxonomy are logged in full and answered with a generic 502.

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode, header};
use http_relay_common::{TunnelError, escape_html};
use tracing::error;

use crate::{RelayConfig, RoutingMode};

/// Header naming the relay-side failure on generated error pages
pub const TUNNEL_ERROR_HEADER: &str = "x-tunnel-error";

/// Longest routing key echoed back in a 404 page
const MAX_ECHOED_KEY_LENGTH: usize = 50;

/// Render a relay-side failure as the public HTTP response
pub fn error_response(err: &TunnelError) -> Response<Body> {
    if !err.is_public() {
        error!("Internal relay error: {}", err);
        return html_response(
            StatusCode::BAD_GATEWAY,
            "<h1>502 Bad Gateway</h1><p>The tunnel could not complete this request.</p>"
                .to_string(),
            Some("Bad Gateway"),
        );
    }

    let (body, label) = match err {
        TunnelError::RoutingKeyNotFound(key) => (
            format!(
                "<h1>404 Not Found</h1><p>The subdomain '<strong>{}</strong>' is not active. \
                 Please check the URL or start a new tunnel.</p>",
                escape_html(&truncate(key, MAX_ECHOED_KEY_LENGTH))
            ),
            "Not Found",
        ),
        TunnelError::GatewayTimeout => (
            "<h1>504 Gateway Timeout</h1><p>The tunnel client did not respond in time.</p>"
                .to_string(),
            "Gateway Timeout",
        ),
        _ => (
            "<h1>502 Bad Gateway</h1><p>The tunnel client disconnected before responding.</p>"
                .to_string(),
            "Tunnel Disconnected",
        ),
    };

    html_response(err.status_code(), body, Some(label))
}

/// Page served on the bare base domain
pub fn welcome_response(config: &RelayConfig) -> Response<Body> {
    let location = match config.routing_mode {
        RoutingMode::Subdomain => "randomly generated subdomains",
        RoutingMode::Path => "randomly generated paths under this domain",
    };
    let body = format!(
        "<h1>Welcome to {} Tunneling Service</h1><p>This is the base domain. \
         Your tunnels will appear on {}.</p>",
        escape_html(&config.base_domain),
        location
    );
    html_response(StatusCode::OK, body, None)
}

fn html_response(
    status: StatusCode,
    body: String,
    tunnel_error: Option<&'static str>,
) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    if let Some(label) = tunnel_error {
        response
            .headers_mut()
            .insert(TUNNEL_ERROR_HEADER, HeaderValue::from_static(label));
    }
    response
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_names_key() {
        let response = error_response(&TunnelError::RoutingKeyNotFound("zzz0000".to_string()));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[TUNNEL_ERROR_HEADER], "Not Found");
        assert!(body_text(response).await.contains("<strong>zzz0000</strong>"));
    }

    #[tokio::test]
    async fn test_not_found_escapes_and_truncates_key() {
        let key = format!("<script>{}", "a".repeat(100));
        let response = error_response(&TunnelError::RoutingKeyNotFound(key));
        let body = body_text(response).await;

        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
        assert!(!body.contains(&"a".repeat(60)));
    }

    #[tokio::test]
    async fn test_gateway_timeout() {
        let response = error_response(&TunnelError::GatewayTimeout);

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(body_text(response).await.starts_with("<h1>504 Gateway Timeout</h1>"));
    }

    #[tokio::test]
    async fn test_disconnect_page() {
        let response = error_response(&TunnelError::TransportDisconnect("socket closed".into()));

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[TUNNEL_ERROR_HEADER], "Tunnel Disconnected");
        assert!(!body_text(response).await.contains("socket closed"));
    }

    #[tokio::test]
    async fn test_internal_errors_are_sanitized() {
        let response = error_response(&TunnelError::InternalError(
            "outbound channel closed for conn 1234".to_string(),
        ));

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(!body.contains("conn 1234"));
    }

    #[tokio::test]
    async fn test_welcome_page() {
        let config = RelayConfig {
            base_domain: "relay.test".to_string(),
            ..Default::default()
        };
        let response = welcome_response(&config);

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(TUNNEL_ERROR_HEADER).is_none());
        assert!(
            body_text(response)
                .await
                .contains("Welcome to relay.test Tunneling Service")
        );
    }

    #[tokio::test]
    async fn test_welcome_page_follows_routing_mode() {
        let subdomain = body_text(welcome_response(&RelayConfig::default())).await;
        assert!(subdomain.contains("generated subdomains"));

        let config = RelayConfig {
            routing_mode: RoutingMode::Path,
            ..Default::default()
        };
        let path = body_text(welcome_response(&config)).await;
        assert!(path.contains("generated paths"));
        assert!(!path.contains("subdomains"));
    }
}
