//! Pending response table
//!
//! Correlates forward_request messages with the forward_response that answers
//! them. Each entry is resolved exactly once: by a response, by the owning
//! connection going away, or by the waiter giving up (timeout or cancellation).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http_relay_common::{ForwardResponse, PendingRequest, Result, TunnelError};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

type Outcome = std::result::Result<ForwardResponse, TunnelError>;

#[derive(Debug)]
struct PendingEntry {
    request: PendingRequest,
    responder: oneshot::Sender<Outcome>,
}

type Entries = Arc<Mutex<HashMap<String, PendingEntry>>>;

/// Shared table of requests awaiting a forward_response
#[derive(Debug, Clone, Default)]
pub struct PendingResponses {
    entries: Entries,
}

impl PendingResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `request_id` as sent on `connection_id`
    ///
    /// The returned waiter removes the entry when dropped, so an abandoned public
    /// request never leaves anything behind.
    pub fn register(&self, request_id: &str, connection_id: &str) -> Result<ResponseWaiter> {
        let (responder, receiver) = oneshot::channel();
        let mut entries = self.entries.lock();

        if entries.contains_key(request_id) {
            return Err(TunnelError::DuplicateRequestId(request_id.to_string()));
        }

        entries.insert(
            request_id.to_string(),
            PendingEntry {
                request: PendingRequest::new(request_id.to_string(), connection_id.to_string()),
                responder,
            },
        );

        Ok(ResponseWaiter {
            request_id: request_id.to_string(),
            receiver,
            entries: self.entries.clone(),
        })
    }

    /// Deliver a forward_response received on `connection_id` to its waiter
    ///
    /// Returns false when no request with that ID is pending on this connection
    /// (already answered, timed out, never issued or owned by another client);
    /// the response is dropped.
    pub fn fulfill(&self, connection_id: &str, response: ForwardResponse) -> bool {
        let entry = {
            let mut entries = self.entries.lock();
            let owned = entries
                .get(&response.request_id)
                .map(|entry| entry.request.is_owned_by(connection_id));
            match owned {
                Some(true) => entries.remove(&response.request_id),
                Some(false) => {
                    warn!(
                        "Connection {} answered request {} it does not own",
                        connection_id, response.request_id
                    );
                    return false;
                }
                None => None,
            }
        };

        match entry {
            Some(entry) => {
                debug!(
                    "Resolving request {} after {:?}",
                    response.request_id,
                    entry.request.age()
                );
                // The waiter may have been dropped between removal and send
                let _ = entry.responder.send(Ok(response));
                true
            }
            None => {
                warn!(
                    "{}",
                    TunnelError::StaleCorrelation(response.request_id.clone())
                );
                false
            }
        }
    }

    /// Resolve every request sent on `connection_id` with a disconnect error
    pub fn cancel_all_for_connection(&self, connection_id: &str, reason: &str) -> usize {
        let cancelled: Vec<PendingEntry> = {
            let mut entries = self.entries.lock();
            let ids: Vec<String> = entries
                .values()
                .filter(|entry| entry.request.is_owned_by(connection_id))
                .map(|entry| entry.request.request_id.clone())
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        let count = cancelled.len();
        for entry in cancelled {
            let _ = entry
                .responder
                .send(Err(TunnelError::TransportDisconnect(reason.to_string())));
        }
        count
    }

    /// Drop an entry without resolving it
    pub fn remove(&self, request_id: &str) -> bool {
        self.entries.lock().remove(request_id).is_some()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.lock().contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving half of one pending entry
#[derive(Debug)]
pub struct ResponseWaiter {
    request_id: String,
    receiver: oneshot::Receiver<Outcome>,
    entries: Entries,
}

impl ResponseWaiter {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait up to `timeout` for the entry to be resolved
    pub async fn wait(self, timeout: Duration) -> Result<ForwardResponse> {
        self.wait_until(Instant::now() + timeout).await
    }

    /// Wait until `deadline` for the entry to be resolved
    pub async fn wait_until(mut self, deadline: Instant) -> Result<ForwardResponse> {
        match tokio::time::timeout_at(deadline, &mut self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a value: the entry was removed externally
            Ok(Err(_)) => Err(TunnelError::TransportDisconnect(
                "pending request discarded".to_string(),
            )),
            Err(_) => Err(TunnelError::GatewayTimeout),
        }
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        self.entries.lock().remove(&self.request_id);
    }
}
