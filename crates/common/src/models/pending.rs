use std::time::{Duration, Instant};

/// Bookkeeping for one forwarded request while the relay waits for its response
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Unique request identifier
    pub request_id: String,

    /// Connection the forward_request was sent on
    pub connection_id: String,

    /// When the request was registered
    pub created_at: Instant,
}

impl PendingRequest {
    /// Create a new pending request entry registered now
    pub fn new(request_id: String, connection_id: String) -> Self {
        Self {
            request_id,
            connection_id,
            created_at: Instant::now(),
        }
    }

    /// Time since the request was registered
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the request was sent on `connection_id`
    pub fn is_owned_by(&self, connection_id: &str) -> bool {
        self.connection_id == connection_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_request_creation() {
        let pending = PendingRequest::new("k3j4h5g6f7d8s9a0".to_string(), "conn_abc".to_string());

        assert_eq!(pending.request_id, "k3j4h5g6f7d8s9a0");
        assert!(pending.is_owned_by("conn_abc"));
        assert!(!pending.is_owned_by("conn_xyz"));
    }

    #[test]
    fn test_pending_request_age() {
        let mut pending =
            PendingRequest::new("k3j4h5g6f7d8s9a0".to_string(), "conn_abc".to_string());
        assert!(pending.age() < Duration::from_secs(30));

        pending.created_at = Instant::now() - Duration::from_secs(31);
        assert!(pending.age() >= Duration::from_secs(31));
    }
}
