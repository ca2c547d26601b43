//! Relay connection lifecycle
//!
//! Owns the WebSocket to the relay: connects, opens the tunnel, serves forwarded
//! requests until the connection drops, then reconnects with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use http_relay_common::constants::OUTBOUND_QUEUE_CAPACITY;
use http_relay_common::validation::validate_request_id;
use http_relay_common::{Message, TunnelError};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::forward::LocalForwarder;

type WebSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection state tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected {
        public_url: String,
        routing_key: String,
    },
    Reconnecting {
        attempt: usize,
        next_delay: Duration,
    },
}

/// Connection manager handles WebSocket lifecycle and reconnection
pub struct ConnectionManager {
    config: Config,
    forwarder: Arc<LocalForwarder>,
    connection_state: Arc<Mutex<ConnectionState>>,
}

impl ConnectionManager {
    pub fn new(config: Config) -> Result<Self> {
        let forwarder = LocalForwarder::new(
            config.local_address.clone(),
            config.local_port,
            config.request_timeout,
        )?;

        Ok(Self {
            config,
            forwarder: Arc::new(forwarder),
            connection_state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
        })
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        self.connection_state.lock().await.clone()
    }

    /// Public URL of the open tunnel, if connected
    pub async fn public_url(&self) -> Option<String> {
        match self.state().await {
            ConnectionState::Connected { public_url, .. } => Some(public_url),
            _ => None,
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.connection_state.lock().await = state;
    }

    /// Main run loop with automatic reconnection
    ///
    /// Returns only when `max_attempts` consecutive failures have been reached.
    pub async fn run(&self) -> Result<()> {
        let reconnect = &self.config.reconnect_config;
        let mut reconnect_delay = reconnect.min_delay;
        let mut attempt = 0;

        loop {
            self.set_state(ConnectionState::Connecting).await;

            match self.establish_connection().await {
                Ok(ws_stream) => {
                    reconnect_delay = reconnect.min_delay;
                    attempt = 0;

                    // Handle the connection until it drops
                    self.handle_connection(ws_stream).await;
                    info!("Disconnected from relay, reconnecting...");
                }
                Err(e) => {
                    error!("Failed to connect: {}", e);
                }
            }

            attempt += 1;
            if reconnect.max_attempts.is_some_and(|max| attempt > max) {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(TunnelError::ConnectionError(format!(
                    "giving up after {} attempts",
                    attempt - 1
                ))
                .into());
            }

            self.set_state(ConnectionState::Reconnecting {
                attempt,
                next_delay: reconnect_delay,
            })
            .await;

            info!(
                "Reconnecting in {:?} (attempt {})",
                reconnect_delay, attempt
            );
            tokio::time::sleep(reconnect_delay).await;

            reconnect_delay = reconnect.next_delay(reconnect_delay);
        }
    }

    /// Connect to the relay and open a tunnel, bounded by the connect timeout
    async fn establish_connection(&self) -> Result<WebSocket> {
        debug!("Connecting to {}", self.config.server_url);

        let handshake = tokio::time::timeout(self.config.connect_timeout, self.open_tunnel());
        let (ws_stream, public_url, routing_key) = handshake.await.map_err(|_| {
            TunnelError::ConnectionError("Connection handshake timeout".to_string())
        })??;

        info!("{}", "-".repeat(60));
        info!("  Public URL: {}", public_url);
        info!("  Forwarding traffic to -> {}", self.config.local_address);
        info!("{}", "-".repeat(60));

        self.set_state(ConnectionState::Connected {
            public_url,
            routing_key,
        })
        .await;

        Ok(ws_stream)
    }

    /// Send start_tunnel and wait for tunnel_created
    async fn open_tunnel(&self) -> Result<(WebSocket, String, String)> {
        let (mut ws_stream, _) = connect_async(&self.config.server_url)
            .await
            .map_err(|e| TunnelError::ConnectionError(e.to_string()))?;

        info!(
            "Connection established with {}. Requesting tunnel for port {}...",
            self.config.server_url, self.config.local_port
        );

        let start = Message::StartTunnel {
            port: Some(self.config.local_port),
        };
        ws_stream
            .send(WsMessage::Text(start.to_json()?.into()))
            .await
            .map_err(|e| {
                TunnelError::WebSocketError(format!("Failed to send start_tunnel: {}", e))
            })?;

        while let Some(message) = ws_stream.next().await {
            match message {
                Ok(WsMessage::Text(text)) => match Message::from_json(&text) {
                    Ok(Message::TunnelCreated { url, routing_key }) => {
                        return Ok((ws_stream, url, routing_key));
                    }
                    Ok(Message::Error { code, message, .. }) => {
                        return Err(TunnelError::ConnectionError(format!(
                            "Relay refused tunnel ({:?}): {}",
                            code, message
                        ))
                        .into());
                    }
                    Ok(other) => debug!("Ignoring {:?} during handshake", other),
                    Err(e) => warn!("Ignoring malformed handshake message: {}", e),
                },
                Ok(WsMessage::Close(_)) => {
                    return Err(TunnelError::ConnectionError(
                        "Server closed connection during handshake".to_string(),
                    )
                    .into());
                }
                Err(e) => {
                    return Err(TunnelError::WebSocketError(e.to_string()).into());
                }
                _ => {}
            }
        }

        Err(TunnelError::ConnectionError("Connection closed before handshake".to_string()).into())
    }

    /// Handle active WebSocket connection with split read/write tasks
    async fn handle_connection(&self, ws_stream: WebSocket) {
        let (write, read) = ws_stream.split();

        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        let mut write_handle = tokio::spawn(spawn_write_task(write, outgoing_rx));

        let mut read_handle = tokio::spawn(spawn_read_task(
            read,
            outgoing_tx.clone(),
            self.forwarder.clone(),
        ));

        let mut heartbeat_handle = tokio::spawn(spawn_heartbeat_task(
            outgoing_tx,
            self.config.heartbeat_interval,
        ));

        // Wait for any task to complete (usually means connection dropped)
        tokio::select! {
            result = &mut write_handle => {
                warn!("Write task ended: {:?}", result);
            }
            result = &mut read_handle => {
                debug!("Read task ended: {:?}", result);
            }
            result = &mut heartbeat_handle => {
                warn!("Heartbeat task ended: {:?}", result);
            }
        }

        write_handle.abort();
        read_handle.abort();
        heartbeat_handle.abort();

        self.set_state(ConnectionState::Disconnected).await;
    }
}

/// Write task sends outgoing messages through WebSocket
async fn spawn_write_task(
    mut write: SplitSink<WebSocket, WsMessage>,
    mut outgoing_rx: mpsc::Receiver<Message>,
) -> Result<()> {
    while let Some(message) = outgoing_rx.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                continue;
            }
        };
        if let Err(e) = write.send(WsMessage::Text(text.into())).await {
            error!("Failed to send message: {}", e);
            break;
        }
    }

    debug!("Write task exiting");
    Ok(())
}

/// Read task receives incoming messages and dispatches them
async fn spawn_read_task(
    mut read: SplitStream<WebSocket>,
    outgoing_tx: mpsc::Sender<Message>,
    forwarder: Arc<LocalForwarder>,
) -> Result<()> {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                if let Err(e) = handle_text_message(&text, &outgoing_tx, &forwarder).await {
                    error!("Error handling message: {}", e);
                }
            }
            Ok(WsMessage::Binary(_)) => {
                warn!("Received unexpected binary message");
            }
            Ok(WsMessage::Ping(_)) => {
                // tungstenite queues the pong itself
                debug!("Received WebSocket ping");
            }
            Ok(WsMessage::Pong(_)) => {
                debug!("Received WebSocket pong");
            }
            Ok(WsMessage::Close(_)) => {
                info!("Server closed connection");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    debug!("Read task exiting");
    Ok(())
}

/// Handle incoming text messages
async fn handle_text_message(
    text: &str,
    outgoing_tx: &mpsc::Sender<Message>,
    forwarder: &Arc<LocalForwarder>,
) -> Result<()> {
    let message = Message::from_json(text)?;

    match message {
        Message::ForwardRequest(request) => {
            if let Err(e) = validate_request_id(&request.request_id) {
                warn!("Dropping forwarded request: {}", e);
                return Ok(());
            }
            info!(
                "[{}] Received request for {} {}",
                request.request_id, request.method, request.path
            );

            // Spawn a new task to handle this request concurrently
            let forwarder = forwarder.clone();
            let outgoing_tx = outgoing_tx.clone();

            tokio::spawn(async move {
                let response = forwarder.forward(request).await;
                if response.is_success() {
                    info!(
                        "[{}] Got local response: {}",
                        response.request_id, response.status_code
                    );
                } else if response.is_server_error() {
                    warn!(
                        "[{}] Local request failed with {}",
                        response.request_id, response.status_code
                    );
                } else {
                    debug!(
                        "[{}] Got local response: {}",
                        response.request_id, response.status_code
                    );
                }
                if let Err(e) = outgoing_tx.send(Message::ForwardResponse(response)).await {
                    error!("Failed to queue response: {}", e);
                }
            });
        }

        Message::Ping => {
            outgoing_tx
                .send(Message::Pong)
                .await
                .map_err(|e| TunnelError::WebSocketError(e.to_string()))?;
        }

        Message::Pong => {
            debug!("Received pong");
        }

        Message::TunnelClosed { routing_key } => {
            info!("Tunnel {} closed by relay", routing_key);
        }

        Message::Error {
            request_id,
            code,
            message,
        } => {
            error!(
                "Server error: {:?} - {} (request_id: {:?})",
                code, message, request_id
            );
        }

        other => {
            warn!("Received unexpected message type: {:?}", other);
        }
    }

    Ok(())
}

/// Heartbeat task sends periodic ping messages
async fn spawn_heartbeat_task(
    outgoing_tx: mpsc::Sender<Message>,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if let Err(e) = outgoing_tx.send(Message::Ping).await {
            error!("Failed to send heartbeat: {}", e);
            break;
        }

        debug!("Sent heartbeat");
    }

    debug!("Heartbeat task exiting");
    Ok(())
}
