use rand::{Rng, thread_rng};
use uuid::Uuid;

use crate::constants::REQUEST_ID_LENGTH;

/// Lowercase alphanumerics; every routing key and request ID is drawn from these
const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random, DNS-label-safe routing key of `length` characters
///
/// Characters are drawn uniformly from the 36-character lowercase alphanumeric
/// alphabet. Uniqueness is the caller's job.
pub fn generate_routing_key(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// Generate a request correlation ID (16 lowercase alphanumerics)
pub fn generate_request_id() -> String {
    generate_routing_key(REQUEST_ID_LENGTH)
}

/// Generate an identifier for a tunnel client connection using UUID v4
pub fn generate_connection_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_routing_key_length() {
        assert_eq!(generate_routing_key(7).len(), 7);
        assert_eq!(generate_routing_key(12).len(), 12);
        assert!(generate_routing_key(0).is_empty());
    }

    #[test]
    fn test_generate_routing_key_format() {
        let key = generate_routing_key(64);
        assert!(key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_routing_key_uses_whole_alphabet() {
        let seen: HashSet<char> = (0..200)
            .flat_map(|_| generate_routing_key(32).chars().collect::<Vec<_>>())
            .collect();
        // 6400 draws from 36 symbols; every one of them shows up
        assert_eq!(seen.len(), 36);
    }

    #[test]
    fn test_generate_request_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = generate_request_id();
            assert_eq!(id.len(), REQUEST_ID_LENGTH);
            assert!(ids.insert(id), "Generated duplicate request ID");
        }
    }

    #[test]
    fn test_generate_connection_id_is_v4() {
        let id = generate_connection_id();
        let uuid = Uuid::parse_str(&id).unwrap();
        assert_eq!(uuid.get_version_num(), 4);
    }
}
