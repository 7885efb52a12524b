//! Request ID generation for request tracing.
//!
//! Every proxied request carries an `x-request-id` header to the backend,
//! either the one the client sent or a freshly generated UUID.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Header used to carry the request ID.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Counter for short connection IDs.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new UUID-based request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short ID based on a counter.
///
/// Only unique within a single process. Format: `conn-{counter}` where
/// counter is zero-padded to 16 hex digits.
pub fn generate_short_id() -> String {
    let count = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("conn-{:016x}", count)
}

/// Request ID wrapper that can be included in tracing spans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new random request ID.
    pub fn new() -> Self {
        Self(generate_request_id())
    }

    /// Create a new short connection ID.
    pub fn short() -> Self {
        Self(generate_short_id())
    }

    /// Reuse the client's `x-request-id` if it is present and printable,
    /// otherwise generate a new one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_default()
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ID as a header value, if it is a valid one.
    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_id() {
        let id1 = generate_request_id();
        let id2 = generate_request_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn test_short_id_prefix_and_uniqueness() {
        let id1 = RequestId::short();
        let id2 = RequestId::short();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn-"));
    }

    #[test]
    fn test_from_headers_propagates() {
        let mut headers = HeaderMap::new();
        headers.insert(&REQUEST_ID_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(RequestId::from_headers(&headers).as_str(), "abc-123");
    }

    #[test]
    fn test_from_headers_generates_when_missing() {
        let headers = HeaderMap::new();
        let id = RequestId::from_headers(&headers);
        assert_eq!(id.as_str().len(), 36);
        assert!(id.header_value().is_some());
    }

    #[test]
    fn test_from_headers_ignores_blank() {
        let mut headers = HeaderMap::new();
        headers.insert(&REQUEST_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(RequestId::from_headers(&headers).as_str().len(), 36);
    }
}
