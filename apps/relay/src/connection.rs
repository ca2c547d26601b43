//! Tunnel client connections
//!
//! Each tunnel client holds one WebSocket open to the relay. Incoming frames are
//! dispatched on the connection's read loop; everything sent to the client goes
//! through a bounded queue drained by a dedicated write task.

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use http_relay_common::constants::{DEFAULT_TUNNEL_PORT, OUTBOUND_QUEUE_CAPACITY};
use http_relay_common::validation::validate_request_id;
use http_relay_common::{
    ErrorCode, ForwardResponse, Message, Result, TunnelError, current_timestamp_secs,
    escape_html, generate_connection_id,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::AppState;

/// Upgrade handler for the tunnel endpoint
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let connection_id = generate_connection_id();

    ws.on_upgrade(move |socket| {
        let span = info_span!("tunnel", connection_id = %connection_id);
        handle_socket(socket, state, host, connection_id).instrument(span)
    })
}

/// Per-connection context handed to message handlers
struct Session<'a> {
    state: &'a AppState,
    connection_id: &'a str,
    host: Option<&'a str>,
    outbound: &'a mpsc::Sender<Message>,
}

impl Session<'_> {
    async fn send(&self, message: Message) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| TunnelError::ConnectionError("outbound queue closed".to_string()))
    }

    async fn send_error(
        &self,
        request_id: Option<String>,
        code: ErrorCode,
        message: String,
    ) -> Result<()> {
        self.send(Message::Error {
            request_id,
            code,
            message,
        })
        .await
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    host: Option<String>,
    connection_id: String,
) {
    info!("Tunnel client connected");

    let (write, mut read) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let write_handle = tokio::spawn(spawn_write_task(write, outbound_rx));

    let session = Session {
        state: &state,
        connection_id: &connection_id,
        host: host.as_deref(),
        outbound: &outbound_tx,
    };

    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                if let Err(e) = handle_text_message(&session, text.as_str()).await {
                    warn!("Error handling message: {}", e);
                }
            }
            Ok(WsMessage::Binary(_)) => {
                warn!("Received unexpected binary message");
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                debug!("Received WebSocket control frame");
            }
            Ok(WsMessage::Close(_)) => {
                info!("Tunnel client closed connection");
                break;
            }
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    handle_disconnect(&state, &connection_id, write_handle).await;
}

/// Write task sends queued messages through the WebSocket
async fn spawn_write_task(
    mut write: SplitSink<WebSocket, WsMessage>,
    mut outbound_rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = outbound_rx.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize outbound message: {}", e);
                continue;
            }
        };
        if let Err(e) = write.send(WsMessage::Text(text.into())).await {
            debug!("Failed to send message: {}", e);
            break;
        }
    }

    let _ = write.close().await;
    debug!("Write task exiting");
}

/// Dispatch one text frame from the tunnel client
async fn handle_text_message(session: &Session<'_>, text: &str) -> Result<()> {
    let message = match Message::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            return session
                .send_error(None, ErrorCode::InvalidRequest, e.to_string())
                .await;
        }
    };

    match message {
        Message::StartTunnel { port } => handle_start_tunnel(session, port).await,

        Message::ForwardResponse(response) => {
            if validate_request_id(&response.request_id).is_err() {
                warn!("Dropping response with malformed request ID");
                return Ok(());
            }
            debug!(
                "Response for {}: status {} ({}ms)",
                response.request_id, response.status_code, response.processing_time_ms
            );
            session.state.pending.fulfill(session.connection_id, response);
            Ok(())
        }

        Message::Error {
            request_id: Some(request_id),
            code,
            message,
        } => {
            warn!(
                "Client reported {:?} for request {}: {}",
                code, request_id, message
            );
            let response = error_reply(request_id, code, &message);
            session.state.pending.fulfill(session.connection_id, response);
            Ok(())
        }

        Message::Error {
            request_id: None,
            code,
            message,
        } => {
            warn!("Client error: {:?} - {}", code, message);
            Ok(())
        }

        Message::CloseTunnel => handle_close_tunnel(session).await,

        Message::Ping => session.send(Message::Pong).await,

        Message::Pong => {
            debug!("Received pong");
            Ok(())
        }

        other => {
            warn!("Received unexpected message from tunnel client: {:?}", other);
            session
                .send_error(
                    None,
                    ErrorCode::InvalidRequest,
                    "unexpected message type".to_string(),
                )
                .await
        }
    }
}

async fn handle_start_tunnel(session: &Session<'_>, port: Option<u16>) -> Result<()> {
    let port = port.filter(|port| *port != 0).unwrap_or(DEFAULT_TUNNEL_PORT);
    let config = &session.state.config;

    let created = session.state.registry.create(
        session.connection_id,
        port,
        session.outbound.clone(),
        |routing_key| config.public_url(routing_key, session.host),
    );

    match created {
        Ok(tunnel) => {
            info!(
                "Tunnel {} created for local port {}: {}",
                tunnel.routing_key, tunnel.local_port, tunnel.public_url
            );
            session
                .send(Message::TunnelCreated {
                    url: tunnel.public_url,
                    routing_key: tunnel.routing_key,
                })
                .await
        }
        Err(e) => {
            warn!("Rejected start_tunnel: {}", e);
            session
                .send_error(None, ErrorCode::InvalidRequest, e.to_string())
                .await
        }
    }
}

async fn handle_close_tunnel(session: &Session<'_>) -> Result<()> {
    match session.state.registry.remove_by_connection(session.connection_id) {
        Some(tunnel) => {
            let cancelled = session
                .state
                .pending
                .cancel_all_for_connection(session.connection_id, "tunnel closed by client");
            info!(
                "Tunnel {} closed by client ({} pending requests cancelled)",
                tunnel.routing_key, cancelled
            );
            session
                .send(Message::TunnelClosed {
                    routing_key: tunnel.routing_key,
                })
                .await
        }
        None => {
            session
                .send_error(
                    None,
                    ErrorCode::InvalidRequest,
                    "no active tunnel on this connection".to_string(),
                )
                .await
        }
    }
}

/// Public response for a request the client could not complete
fn error_reply(request_id: String, code: ErrorCode, message: &str) -> ForwardResponse {
    let status = code.status_code();
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Error");
    ForwardResponse::html(
        request_id,
        status,
        format!("<h1>{} {}</h1><p>{}</p>", status, reason, escape_html(message)),
    )
}

/// Tear down everything a closed connection owned
///
/// The write task is stopped first so that any forward still holding the
/// connection's queue fails to send, then the tunnel is unregistered and the
/// requests already sent are failed immediately.
async fn handle_disconnect(state: &AppState, connection_id: &str, write_handle: JoinHandle<()>) {
    write_handle.abort();
    let _ = write_handle.await;

    if let Some(tunnel) = state.registry.remove_by_connection(connection_id) {
        info!(
            "Tunnel {} removed after {}s",
            tunnel.routing_key,
            tunnel.age_secs(current_timestamp_secs())
        );
    }

    let cancelled = state
        .pending
        .cancel_all_for_connection(connection_id, "tunnel client disconnected");
    if cancelled > 0 {
        warn!("Failed {} in-flight requests on disconnect", cancelled);
    }

    info!("Tunnel client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reply_maps_code_to_status() {
        let response = error_reply(
            "k3j4h5g6f7d8s9a0".to_string(),
            ErrorCode::LocalServiceUnavailable,
            "connection refused",
        );
        assert_eq!(response.status_code, 502);
        let body = String::from_utf8(response.response_body).unwrap();
        assert!(body.starts_with("<h1>502 Bad Gateway</h1>"));
        assert!(body.contains("connection refused"));

        let response = error_reply("k3j4h5g6f7d8s9a0".to_string(), ErrorCode::Timeout, "slow");
        assert_eq!(response.status_code, 504);

        let response = error_reply(
            "k3j4h5g6f7d8s9a0".to_string(),
            ErrorCode::InvalidRequest,
            "<bad>",
        );
        assert_eq!(response.status_code, 400);
        let body = String::from_utf8(response.response_body).unwrap();
        assert!(body.contains("&lt;bad&gt;"));
    }
}
