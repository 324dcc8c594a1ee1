//! Requests, responses and the network seam
//!
//! The `Network` trait is what the install coordinator and the fetch
//! arbiter talk to. `HttpNetwork` is the real origin client; tests use a
//! scripted fake.

mod http;

pub use http::HttpNetwork;

use crate::error::OffcacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// What kind of resource a request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Top-level navigation (HTML document)
    Document,
    Script,
    Style,
    Image,
    #[default]
    Other,
}

/// A single resource request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Absolute URL or origin-relative path
    pub url: String,
    /// Resource kind
    pub destination: Destination,
    /// Upper bound the transport enforces on its own
    pub timeout: Option<Duration>,
}

impl Request {
    /// Subresource request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: Destination::Other,
            timeout: None,
        }
    }

    /// Navigational (document) request
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: Destination::Document,
            timeout: None,
        }
    }

    /// Bound the transport to `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether this is a navigation
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }
}

/// Captured response: status, headers and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Response with the canonical reason phrase for `status`
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Add a header (names are stored lowercase)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Override the status text
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Status in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Synthetic 408 for a first-time caller whose network attempt failed
    pub fn request_timeout() -> Self {
        Self::new(408, b"Network timeout - connection too slow".to_vec())
            .with_status_text("Request Timeout")
    }

    /// Synthetic 503 when neither network nor cache can answer
    pub fn service_unavailable() -> Self {
        Self::new(503, b"Service temporarily unavailable".to_vec())
            .with_status_text("Service Temporarily Unavailable")
            .with_header("Content-Type", "text/plain")
            .with_header("Cache-Control", "no-cache")
    }

    /// Body as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Canonical reason phrase for common status codes
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

/// Network access as seen by the worker
///
/// `fetch` returns `Ok` for any HTTP response, including error statuses;
/// `Err` means the transport itself failed.
#[async_trait]
pub trait Network: Send + Sync {
    /// Whether the runtime reports connectivity
    fn is_online(&self) -> bool;

    /// Perform a request against the network
    async fn fetch(&self, request: &Request) -> OffcacheResult<Response>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_range() {
        assert!(Response::new(200, vec![]).is_ok());
        assert!(Response::new(204, vec![]).is_ok());
        assert!(!Response::new(304, vec![]).is_ok());
        assert!(!Response::new(500, vec![]).is_ok());
    }

    #[test]
    fn synthetic_responses() {
        let timeout = Response::request_timeout();
        assert_eq!(timeout.status, 408);
        assert_eq!(timeout.status_text, "Request Timeout");

        let unavailable = Response::service_unavailable();
        assert_eq!(unavailable.status, 503);
        assert_eq!(unavailable.header("content-type"), Some("text/plain"));
        assert_eq!(unavailable.header("Cache-Control"), Some("no-cache"));
        assert_eq!(unavailable.text(), "Service temporarily unavailable");
    }

    #[test]
    fn navigation_flag() {
        assert!(Request::navigate("/").is_navigation());
        assert!(!Request::get("/main.js").is_navigation());
    }

    #[test]
    fn timeout_carried_by_request() {
        assert_eq!(Request::get("/").timeout, None);
        let bounded = Request::navigate("/").with_timeout(Duration::from_millis(5000));
        assert_eq!(bounded.timeout, Some(Duration::from_millis(5000)));
        assert!(bounded.is_navigation());
    }
}
