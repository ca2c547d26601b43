//! Input validation for data crossing the tunnel boundary
//!
//! Routing keys arrive from arbitrary public Host headers and paths, request IDs and
//! paths arrive from the other end of the tunnel. Both are checked before they are
//! used as map keys, logged, or spliced into URLs.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::constants::REQUEST_ID_LENGTH;

/// Regex for validating routing keys (a DNS label of lowercase alphanumerics)
static ROUTING_KEY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]{1,63}$").unwrap());

/// Regex for validating request IDs (fixed-length lowercase alphanumerics)
static REQUEST_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^[a-z0-9]{{{}}}$", REQUEST_ID_LENGTH)).unwrap()
});

/// Maximum length for forwarded paths (including query string)
pub const MAX_PATH_LENGTH: usize = 8192;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid routing key format: {0}")]
    InvalidRoutingKey(String),

    #[error("Invalid request ID format: {0}")]
    InvalidRequestId(String),

    #[error("Path too long: {0} bytes (max: {1})")]
    PathTooLong(usize, usize),
}

/// Truncate untrusted input before it goes into an error message
fn excerpt(input: &str) -> String {
    input.chars().take(50).collect()
}

/// Validate routing key format
///
/// Routing keys must be 1-63 lowercase alphanumeric characters so they work both
/// as a subdomain label and as a path segment.
///
/// # Examples
///
/// ```
/// use http_relay_common::validation::validate_routing_key;
///
/// assert!(validate_routing_key("ab3x9fz").is_ok());
/// assert!(validate_routing_key("INVALID").is_err());
/// assert!(validate_routing_key("").is_err());
/// ```
pub fn validate_routing_key(key: &str) -> Result<(), ValidationError> {
    if !ROUTING_KEY_REGEX.is_match(key) {
        return Err(ValidationError::InvalidRoutingKey(excerpt(key)));
    }
    Ok(())
}

/// Validate request ID format
///
/// ```
/// use http_relay_common::validation::validate_request_id;
///
/// assert!(validate_request_id("k3j4h5g6f7d8s9a0").is_ok());
/// assert!(validate_request_id("invalid").is_err());
/// ```
pub fn validate_request_id(id: &str) -> Result<(), ValidationError> {
    if !REQUEST_ID_REGEX.is_match(id) {
        return Err(ValidationError::InvalidRequestId(excerpt(id)));
    }
    Ok(())
}

/// Validate and sanitize HTTP path
///
/// - Removes control characters
/// - Enforces length limits
/// - Ensures path starts with /
pub fn validate_path(path: &str) -> Result<String, ValidationError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong(path.len(), MAX_PATH_LENGTH));
    }

    let sanitized: String = path.chars().filter(|c| !c.is_control()).collect();

    if sanitized.is_empty() {
        Ok("/".to_string())
    } else if sanitized.starts_with('/') {
        Ok(sanitized)
    } else {
        Ok(format!("/{}", sanitized))
    }
}
