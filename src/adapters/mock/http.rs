//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that returns predefined responses
//! or errors, and records every request for later assertions.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::traits::{Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET, POST or DELETE)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body (for POST requests)
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Look up a recorded header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response (any status)
    Success(Response),
    /// Return a transport error
    Error(HttpError),
}

impl MockResponse {
    /// Response with a status and a text body.
    pub fn status(status: u16, body: &str) -> Self {
        MockResponse::Success(Response::new(status, Bytes::from(body.to_string())))
    }

    /// 200 response with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        MockResponse::Success(Response::new(200, Bytes::from(value.to_string())))
    }

    /// Response carrying one header.
    pub fn with_header(status: u16, name: &str, value: &str, body: &str) -> Self {
        let mut headers = Headers::new();
        headers.insert(name.to_lowercase(), value.to_string());
        MockResponse::Success(Response::with_headers(
            status,
            headers,
            Bytes::from(body.to_string()),
        ))
    }
}

/// Mock HTTP client for testing.
///
/// Responses are looked up in this order: the queue for the exact URL (each
/// queued response is returned once), the fixed response for the exact URL,
/// the fixed response with the longest matching URL prefix, the default.
///
/// # Example
///
/// ```ignore
/// use deckhand::adapters::mock::{MockHttpClient, MockResponse};
/// use deckhand::traits::{HttpClient, Headers};
///
/// let client = MockHttpClient::new();
/// client.push_response("http://tr/transmission/rpc", MockResponse::with_header(
///     409, "X-Transmission-Session-Id", "abc", "",
/// ));
/// client.set_response("http://tr/transmission/rpc", MockResponse::json(json!({"result": "success"})));
///
/// assert_eq!(client.post("http://tr/transmission/rpc", "{}", &Headers::new()).await?.status, 409);
/// assert_eq!(client.post("http://tr/transmission/rpc", "{}", &Headers::new()).await?.status, 200);
/// ```
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    /// Configured responses by URL pattern
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// One-shot responses by exact URL
    queued: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    /// Default response when no specific match
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            queued: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set a response for a URL or URL prefix.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), response);
    }

    /// Queue a response returned once for the exact URL.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        let mut queued = self.queued.lock().unwrap();
        queued.entry(url.to_string()).or_default().push_back(response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        let mut default = self.default_response.lock().unwrap();
        *default = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.get_requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Clear all configured responses.
    pub fn clear_responses(&self) {
        self.responses.lock().unwrap().clear();
        self.queued.lock().unwrap().clear();
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        if let Some(queue) = self.queued.lock().unwrap().get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }

        let responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        let prefix_match = responses
            .iter()
            .filter(|(pattern, _)| url.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, response)| response.clone());
        if prefix_match.is_some() {
            return prefix_match;
        }

        self.default_response.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<Response, HttpError> {
        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.respond(url)
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.respond(url)
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("DELETE", url, headers, None);
        self.respond(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_with_response() {
        let client = MockHttpClient::new();
        client.set_response("https://example.com/test", MockResponse::status(200, "Hello"));

        let response = client
            .get("https://example.com/test", &Headers::new())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from("Hello"));

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
    }

    #[tokio::test]
    async fn test_queue_is_consumed_before_fixed_response() {
        let client = MockHttpClient::new();
        let url = "http://tr/transmission/rpc";
        client.push_response(
            url,
            MockResponse::with_header(409, "X-Transmission-Session-Id", "abc", ""),
        );
        client.set_response(url, MockResponse::status(200, "{}"));

        let first = client.post(url, "{}", &Headers::new()).await.unwrap();
        assert_eq!(first.status, 409);
        assert_eq!(first.header("X-Transmission-Session-Id"), Some("abc"));
        let second = client.post(url, "{}", &Headers::new()).await.unwrap();
        assert_eq!(second.status, 200);
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let client = MockHttpClient::new();
        client.set_response("http://x/api", MockResponse::status(200, "short"));
        client.set_response("http://x/api/v1", MockResponse::status(200, "long"));

        let response = client.get("http://x/api/v1/request", &Headers::new()).await.unwrap();
        assert_eq!(response.text_lossy(), "long");
    }

    #[tokio::test]
    async fn test_error_and_missing_responses() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/down",
            MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
        );

        assert!(matches!(
            client.get("https://example.com/down", &Headers::new()).await,
            Err(HttpError::ConnectionFailed(_))
        ));
        assert!(matches!(
            client.delete("https://example.com/missing", &Headers::new()).await,
            Err(HttpError::Other(_))
        ));
        assert_eq!(client.requests_to("https://example.com").len(), 2);
    }

    #[tokio::test]
    async fn test_default_response() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::status(404, "Not Found"));

        let response = client
            .get("https://example.com/anything", &Headers::new())
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_headers_recorded() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::status(200, ""));

        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), "Bearer token123".to_string());
        client.get("https://example.com/auth", &headers).await.unwrap();

        let requests = client.get_requests();
        assert_eq!(requests[0].header("authorization"), Some("Bearer token123"));

        client.clear_requests();
        assert!(client.get_requests().is_empty());
    }
}
