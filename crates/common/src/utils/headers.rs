use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

use crate::constants::HOP_BY_HOP_HEADERS;

/// Convert HTTP headers to our internal format
/// Supports multiple values per header name
pub fn headers_to_map(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();

    for (name, value) in headers.iter() {
        let key = name.as_str().to_string();
        let val = value.to_str().unwrap_or("").to_string();

        map.entry(key).or_default().push(val);
    }

    map
}

/// Convert our internal header format to HTTP HeaderMap
pub fn map_to_headers(map: &HashMap<String, Vec<String>>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, values) in map.iter() {
        if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) {
            for value in values {
                if let Ok(header_value) = HeaderValue::from_str(value) {
                    headers.append(header_name.clone(), header_value);
                }
            }
        }
    }

    headers
}

/// Drop headers that describe one hop's transfer; the receiving side recomputes them
pub fn strip_hop_by_hop(mut map: HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    map.retain(|name, _| {
        !HOP_BY_HOP_HEADERS
            .iter()
            .any(|hop| name.eq_ignore_ascii_case(hop))
    });
    map
}

/// Drop the Host header, which names the public endpoint rather than the local service
pub fn without_host(mut map: HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    map.retain(|name, _| !name.eq_ignore_ascii_case("host"));
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_to_map_empty() {
        let headers = HeaderMap::new();
        assert!(headers_to_map(&headers).is_empty());
    }

    #[test]
    fn test_headers_to_map_multiple_values() {
        let mut headers = HeaderMap::new();
        headers.insert("set-cookie", "session=abc".parse().unwrap());
        headers.append("set-cookie", "token=xyz".parse().unwrap());

        let map = headers_to_map(&headers);
        assert_eq!(map.len(), 1);

        let cookies = map.get("set-cookie").unwrap();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.contains(&"session=abc".to_string()));
        assert!(cookies.contains(&"token=xyz".to_string()));
    }

    #[test]
    fn test_map_to_headers_multiple_values() {
        let mut map = HashMap::new();
        map.insert(
            "set-cookie".to_string(),
            vec!["session=abc".to_string(), "token=xyz".to_string()],
        );

        let headers = map_to_headers(&map);
        let cookies: Vec<_> = headers
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();

        assert_eq!(cookies.len(), 2);
        assert!(cookies.contains(&"session=abc"));
        assert!(cookies.contains(&"token=xyz"));
    }

    #[test]
    fn test_map_to_headers_invalid_header_name() {
        let mut map = HashMap::new();
        map.insert("valid-header".to_string(), vec!["value".to_string()]);
        map.insert("invalid header".to_string(), vec!["value".to_string()]); // Space is invalid

        let headers = map_to_headers(&map);

        assert_eq!(headers.len(), 1);
        assert!(headers.get("valid-header").is_some());
    }

    #[test]
    fn test_headers_to_map_non_utf8_handling() {
        let mut headers = HeaderMap::new();
        headers.insert("x-binary-header", HeaderValue::from_bytes(&[0xFF, 0xFE]).unwrap());

        let map = headers_to_map(&headers);
        assert_eq!(map.get("x-binary-header").unwrap(), &vec![""]);
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut map = HashMap::new();
        for name in [
            "Content-Encoding",
            "content-length",
            "Transfer-Encoding",
            "connection",
            "content-type",
            "x-custom",
        ] {
            map.insert(name.to_string(), vec!["v".to_string()]);
        }

        let stripped = strip_hop_by_hop(map);
        let mut names: Vec<_> = stripped.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["content-type", "x-custom"]);
    }

    #[test]
    fn test_without_host() {
        let mut map = HashMap::new();
        map.insert("Host".to_string(), vec!["ab3x9fz.relay.test".to_string()]);
        map.insert("accept".to_string(), vec!["*/*".to_string()]);

        let map = without_host(map);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("accept"));
    }
}
