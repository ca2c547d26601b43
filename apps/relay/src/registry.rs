//! Tunnel registry
//!
//! Maps public routing keys to the live client connection that serves them. A
//! connection owns at most one tunnel, so the registry keeps a reverse index from
//! connection ID to routing key for disconnect cleanup.

use std::collections::HashMap;

use http_relay_common::{
    Message, Result, Tunnel, TunnelError, current_timestamp_secs, generate_routing_key,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// A registered tunnel together with the queue feeding its client connection
#[derive(Debug, Clone)]
pub struct TunnelHandle {
    pub tunnel: Tunnel,
    pub outbound: mpsc::Sender<Message>,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_key: HashMap<String, TunnelHandle>,
    by_connection: HashMap<String, String>,
}

/// In-memory registry of active tunnels
///
/// Every operation takes the same lock, so allocating a key is an atomic
/// check-and-insert and removal never interleaves with a lookup.
#[derive(Debug)]
pub struct TunnelRegistry {
    key_length: usize,
    state: Mutex<RegistryState>,
}

impl TunnelRegistry {
    pub fn new(key_length: usize) -> Self {
        Self {
            key_length,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Allocate a fresh routing key for `connection_id` and store its tunnel
    ///
    /// `public_url` builds the announced URL from the allocated key. Fails with
    /// `TunnelAlreadyExists` when the connection already owns a tunnel.
    pub fn create(
        &self,
        connection_id: &str,
        local_port: u16,
        outbound: mpsc::Sender<Message>,
        public_url: impl FnOnce(&str) -> String,
    ) -> Result<Tunnel> {
        let mut state = self.state.lock();

        if let Some(existing) = state.by_connection.get(connection_id) {
            return Err(TunnelError::TunnelAlreadyExists(existing.clone()));
        }

        let mut routing_key = generate_routing_key(self.key_length);
        while state.by_key.contains_key(&routing_key) {
            debug!("Routing key collision on {}, regenerating", routing_key);
            routing_key = generate_routing_key(self.key_length);
        }

        let tunnel = Tunnel::new(
            routing_key.clone(),
            connection_id.to_string(),
            local_port,
            public_url(&routing_key),
            current_timestamp_secs(),
        );

        state
            .by_connection
            .insert(connection_id.to_string(), routing_key.clone());
        state.by_key.insert(
            routing_key,
            TunnelHandle {
                tunnel: tunnel.clone(),
                outbound,
            },
        );

        Ok(tunnel)
    }

    /// Find the tunnel serving `routing_key`
    pub fn lookup(&self, routing_key: &str) -> Option<TunnelHandle> {
        self.state.lock().by_key.get(routing_key).cloned()
    }

    /// Remove the tunnel owned by `connection_id`, if any
    pub fn remove_by_connection(&self, connection_id: &str) -> Option<Tunnel> {
        let mut state = self.state.lock();
        let routing_key = state.by_connection.remove(connection_id)?;
        state.by_key.remove(&routing_key).map(|handle| handle.tunnel)
    }

    /// Number of active tunnels
    pub fn len(&self) -> usize {
        self.state.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
