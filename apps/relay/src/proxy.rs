//! Public HTTP request handling
//!
//! Every request that is not the tunnel WebSocket endpoint lands here. It is
//! routed to a tunnel by routing key, forwarded as a forward_request, and held
//! until the client answers or the response deadline expires.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Response, Uri, header};
use http_relay_common::validation::validate_routing_key;
use http_relay_common::{ForwardResponse, Message, Result, TunnelError, generate_request_id};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::error_handling::{error_response, welcome_response};
use crate::{AppState, RouteTarget, build_forward_request, build_http_response, resolve_route};

/// Catch-all handler for public HTTP requests
pub async fn handle_proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()));
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match resolve_route(&state.config, host, path_and_query) {
        RouteTarget::Welcome => welcome_response(&state.config),
        RouteTarget::Tunnel { routing_key, path } => {
            match forward(&state, &routing_key, &method, path, &headers, body).await {
                Ok(response) => build_http_response(response),
                Err(e) => {
                    warn!(
                        "{} {} for routing key {} failed: {}",
                        method, path_and_query, routing_key, e
                    );
                    error_response(&e)
                }
            }
        }
    }
}

/// Forward one public request over the tunnel owning `routing_key` and wait for its response
pub async fn forward(
    state: &AppState,
    routing_key: &str,
    method: &Method,
    path: String,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ForwardResponse> {
    let deadline = Instant::now() + state.config.response_timeout;

    validate_routing_key(routing_key)
        .map_err(|_| TunnelError::RoutingKeyNotFound(routing_key.to_string()))?;

    let handle = state
        .registry
        .lookup(routing_key)
        .ok_or_else(|| TunnelError::RoutingKeyNotFound(routing_key.to_string()))?;

    let request_id = generate_request_id();
    let waiter = state
        .pending
        .register(&request_id, &handle.tunnel.connection_id)?;

    let request = build_forward_request(request_id.clone(), method, path, headers, body);
    debug!(
        request_id = %request_id,
        routing_key,
        "Forwarding {} {} to connection {}",
        request.method,
        request.path,
        handle.tunnel.connection_id
    );

    // A client that stops reading fills its queue; the deadline covers the send too
    timeout_at(deadline, handle.outbound.send(Message::ForwardRequest(request)))
        .await
        .map_err(|_| TunnelError::GatewayTimeout)?
        .map_err(|_| {
            TunnelError::TransportDisconnect(format!(
                "connection {} closed before request {} was sent",
                handle.tunnel.connection_id, request_id
            ))
        })?;

    let response = waiter.wait_until(deadline).await?;
    info!(
        request_id = %request_id,
        routing_key,
        "Request completed with status {} ({}ms at client)",
        response.status_code,
        response.processing_time_ms
    );
    Ok(response)
}
