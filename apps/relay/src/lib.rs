//! HTTP relay server
//!
//! Accepts public HTTP requests, routes them by routing key to the tunnel client
//! that owns the key, and suspends each request until the client's correlated
//! forward_response arrives or the response deadline expires.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, Method, Response, StatusCode};
use axum::routing::any;
use http_relay_common::{
    ForwardRequest, ForwardResponse, current_timestamp_millis, headers_to_map, map_to_headers,
    strip_hop_by_hop, without_host,
};
use tracing::warn;

pub mod config;
pub mod connection;
pub mod error_handling;
pub mod pending;
pub mod proxy;
pub mod registry;


pub use config::{RelayConfig, RoutingMode};
pub use pending::{PendingResponses, ResponseWaiter};
pub use registry::{TunnelHandle, TunnelRegistry};

use config::strip_port;

/// State shared by every HTTP handler and tunnel connection
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub registry: Arc<TunnelRegistry>,
    pub pending: PendingResponses,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let registry = TunnelRegistry::new(config.routing_key_length);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            pending: PendingResponses::new(),
        }
    }
}

/// Build the relay's router: the tunnel WebSocket endpoint plus a catch-all proxy
pub fn build_router(state: AppState) -> Router {
    let tunnel_path = state.config.tunnel_path.clone();
    let body_limit = state.config.max_body_size;

    Router::new()
        .route(&tunnel_path, any(connection::ws_handler))
        .fallback(proxy::handle_proxy)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Where a public request should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Bare base domain (or a host outside it)
    Welcome,
    /// A routing key and the path+query the local service should see
    Tunnel { routing_key: String, path: String },
}

/// Derive the routing target of a public request
pub fn resolve_route(
    config: &RelayConfig,
    host: Option<&str>,
    path_and_query: &str,
) -> RouteTarget {
    match config.routing_mode {
        RoutingMode::Subdomain => {
            let Some(host) = host else {
                return RouteTarget::Welcome;
            };
            match extract_subdomain(host, &config.base_hostname()) {
                Some(routing_key) => RouteTarget::Tunnel {
                    routing_key,
                    path: path_and_query.to_string(),
                },
                None => RouteTarget::Welcome,
            }
        }
        RoutingMode::Path => match extract_routing_key_from_path(path_and_query) {
            Some(routing_key) => RouteTarget::Tunnel {
                routing_key,
                path: strip_routing_key_from_path(path_and_query),
            },
            None => RouteTarget::Welcome,
        },
    }
}

/// Extract the subdomain part of `host` under `base_hostname`
/// Example: "ab3x9fz.relay.test:5000" under "relay.test" -> "ab3x9fz"
pub fn extract_subdomain(host: &str, base_hostname: &str) -> Option<String> {
    let hostname = strip_port(host).to_ascii_lowercase();
    let subdomain = hostname.strip_suffix(base_hostname)?.strip_suffix('.')?;
    if subdomain.is_empty() {
        None
    } else {
        Some(subdomain.to_string())
    }
}

/// Extract the routing key from the first path segment
/// Example: "/ab3x9fz/api/users?x=1" -> "ab3x9fz"
pub fn extract_routing_key_from_path(path_and_query: &str) -> Option<String> {
    let path = path_and_query.split('?').next().unwrap_or_default();
    let segment = path.trim_start_matches('/').split('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Strip the routing key segment before forwarding to the local service
/// Example: "/ab3x9fz/api/users?x=1" -> "/api/users?x=1"
/// Example: "/ab3x9fz" -> "/"
pub fn strip_routing_key_from_path(path_and_query: &str) -> String {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let rest = match path.trim_start_matches('/').split_once('/') {
        Some((_, rest)) => format!("/{}", rest),
        None => "/".to_string(),
    };

    match query {
        Some(query) => format!("{}?{}", rest, query),
        None => rest,
    }
}

/// Build the forward_request message for a public request
pub fn build_forward_request(
    request_id: String,
    method: &Method,
    path: String,
    headers: &HeaderMap,
    body: Bytes,
) -> ForwardRequest {
    let mut request = ForwardRequest::new(
        method.as_str().to_string(),
        path,
        request_id,
        current_timestamp_millis(),
    );
    request.headers = without_host(headers_to_map(headers));
    request.body = body.to_vec();
    request
}

/// Convert a client's forward_response into the public HTTP response
pub fn build_http_response(response: ForwardResponse) -> Response<Body> {
    let status = StatusCode::from_u16(response.status_code).unwrap_or_else(|_| {
        warn!(
            "Request {} returned invalid status {}, answering 502",
            response.request_id, response.status_code
        );
        StatusCode::BAD_GATEWAY
    });
    let has_body = response.has_body();
    let headers: HashMap<String, Vec<String>> = strip_hop_by_hop(response.response_headers);
    let body = if has_body {
        Body::from(response.response_body)
    } else {
        Body::empty()
    };

    let mut http_response = Response::new(body);
    *http_response.status_mut() = status;
    *http_response.headers_mut() = map_to_headers(&headers);
    http_response
}
