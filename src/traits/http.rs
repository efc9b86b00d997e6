//! HTTP client trait abstraction.
//!
//! Every adapter talks to its upstream through [`HttpClient`], which keeps the
//! integrations testable against [`crate::adapters::MockHttpClient`] and lets
//! the registry hand out clients with different TLS and timeout policies.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// Separator used when a response repeats a header (e.g. several `Set-Cookie`).
pub const REPEATED_HEADER_SEPARATOR: char = '\n';

/// HTTP response wrapper.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(status: u16, body: Bytes) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Create a new response with headers.
    pub fn with_headers(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the response body as a string.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Get the response body as a string, replacing invalid UTF-8.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Extract the value of a cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.header("set-cookie")?;
        raw.split(REPEATED_HEADER_SEPARATOR)
            .filter_map(|line| line.split(';').next())
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

/// HTTP client errors.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpError {
    /// Connection failed
    ConnectionFailed(String),
    /// Request timeout
    Timeout(String),
    /// Server returned an error status
    ServerError { status: u16, message: String },
    /// Request was cancelled
    Cancelled,
    /// IO error
    Io(String),
    /// Invalid URL
    InvalidUrl(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            HttpError::Timeout(msg) => write!(f, "Request timeout: {}", msg),
            HttpError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            HttpError::Cancelled => write!(f, "Request cancelled"),
            HttpError::Io(msg) => write!(f, "IO error: {}", msg),
            HttpError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            HttpError::Other(msg) => write!(f, "HTTP error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

/// Trait for HTTP client operations.
///
/// Non-2xx statuses are returned as a [`Response`], not as an error; only
/// transport failures produce [`HttpError`]. Adapters decide what a status means.
///
/// # Example
///
/// ```ignore
/// use deckhand::traits::{HttpClient, Headers, HttpError};
///
/// async fn version<C: HttpClient>(client: &C, base: &str) -> Result<String, HttpError> {
///     let response = client.get(&format!("{base}/api/v2/app/version"), &Headers::new()).await?;
///     Ok(response.text_lossy())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request.
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError>;

    /// Perform a POST request with a pre-encoded body.
    ///
    /// Callers set `Content-Type` in `headers` to match the body encoding.
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError>;

    /// Perform a DELETE request.
    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_new() {
        let response = Response::new(200, Bytes::from("Hello"));
        assert_eq!(response.status, 200);
        assert!(response.headers.is_empty());
        assert_eq!(response.body, Bytes::from("Hello"));
    }

    #[test]
    fn test_response_is_success() {
        assert!(Response::new(200, Bytes::new()).is_success());
        assert!(Response::new(204, Bytes::new()).is_success());
        assert!(!Response::new(300, Bytes::new()).is_success());
        assert!(!Response::new(401, Bytes::new()).is_success());
        assert!(!Response::new(500, Bytes::new()).is_success());
    }

    #[test]
    fn test_response_json() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Version {
            version: String,
        }

        let response = Response::new(200, Bytes::from(r#"{"version":"6.0"}"#));
        let data: Version = response.json().unwrap();
        assert_eq!(data.version, "6.0");
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.insert(
            "x-transmission-session-id".to_string(),
            "abc123".to_string(),
        );
        let response = Response::with_headers(409, headers, Bytes::new());
        assert_eq!(response.header("X-Transmission-Session-Id"), Some("abc123"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn test_cookie_extraction() {
        let mut headers = Headers::new();
        headers.insert(
            "set-cookie".to_string(),
            "theme=dark; Path=/\nSID=s3ss10n; HttpOnly; Path=/".to_string(),
        );
        let response = Response::with_headers(200, headers, Bytes::from("Ok."));
        assert_eq!(response.cookie("SID"), Some("s3ss10n".to_string()));
        assert_eq!(response.cookie("theme"), Some("dark".to_string()));
        assert_eq!(response.cookie("_session_id"), None);
    }

    #[test]
    fn test_http_error_display() {
        assert_eq!(
            HttpError::ConnectionFailed("refused".to_string()).to_string(),
            "Connection failed: refused"
        );
        assert_eq!(
            HttpError::Timeout("10s".to_string()).to_string(),
            "Request timeout: 10s"
        );
        assert_eq!(HttpError::Cancelled.to_string(), "Request cancelled");
    }
}
