//! Reqwest-based HTTP client adapter.
//!
//! Production implementation of [`HttpClient`]. Each client carries its own
//! timeout and TLS policy, so the registry builds one for credentialed
//! integrations and a separate, relaxed one for the HTTP probe.

use async_trait::async_trait;
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, Response, REPEATED_HEADER_SEPARATOR};

/// HTTP client implementation using reqwest.
///
/// # Example
///
/// ```ignore
/// use deckhand::adapters::ReqwestHttpClient;
/// use deckhand::traits::{Headers, HttpClient};
///
/// let client = ReqwestHttpClient::with_timeout(Duration::from_secs(10))?;
/// let response = client.get("http://nas.local:8080/api/v2/app/version", &Headers::new()).await?;
/// println!("Status: {}", response.status);
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client with a total request timeout and full TLS validation.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        Self::build(timeout, false)
    }

    /// Create a client that accepts self-signed and otherwise invalid
    /// certificates. Only the reachability probe uses this.
    pub fn insecure(timeout: Duration) -> Result<Self, HttpError> {
        Self::build(timeout, true)
    }

    fn build(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| HttpError::Other(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Convert reqwest error to HttpError.
    fn convert_error(err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_connect() {
            HttpError::ConnectionFailed(err.to_string())
        } else if err.is_builder() {
            HttpError::InvalidUrl(err.to_string())
        } else if err.is_body() || err.is_decode() {
            HttpError::Io(err.to_string())
        } else {
            HttpError::Other(err.to_string())
        }
    }

    /// Convert reqwest headers to our Headers type.
    ///
    /// Repeated headers (several `Set-Cookie`, for one) are joined with
    /// [`REPEATED_HEADER_SEPARATOR`].
    fn convert_headers(headers: &reqwest::header::HeaderMap) -> Headers {
        let mut converted = Headers::new();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            converted
                .entry(name.to_string())
                .and_modify(|existing: &mut String| {
                    existing.push(REPEATED_HEADER_SEPARATOR);
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        converted
    }

    /// Apply headers to a request builder.
    fn apply_headers(
        builder: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> reqwest::RequestBuilder {
        let mut builder = builder;
        for (key, value) in headers {
            builder = builder.header(key, value);
        }
        builder
    }

    async fn send(
        builder: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> Result<Response, HttpError> {
        let builder = Self::apply_headers(builder, headers);
        let response = builder.send().await.map_err(Self::convert_error)?;

        let status = response.status().as_u16();
        let response_headers = Self::convert_headers(response.headers());
        let body = response.bytes().await.map_err(Self::convert_error)?;

        Ok(Response::with_headers(status, response_headers, body))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::send(self.client.get(url), headers).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::send(self.client.post(url).body(body.to_string()), headers).await
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::send(self.client.delete(url), headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_builders() {
        assert!(ReqwestHttpClient::with_timeout(Duration::from_secs(10)).is_ok());
        assert!(ReqwestHttpClient::insecure(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_convert_headers_joins_repeats() {
        let mut header_map = reqwest::header::HeaderMap::new();
        header_map.append(reqwest::header::SET_COOKIE, "a=1; Path=/".parse().unwrap());
        header_map.append(reqwest::header::SET_COOKIE, "SID=xyz; HttpOnly".parse().unwrap());
        header_map.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );

        let headers = ReqwestHttpClient::convert_headers(&header_map);
        assert_eq!(
            headers.get("set-cookie"),
            Some(&"a=1; Path=/\nSID=xyz; HttpOnly".to_string())
        );
        assert_eq!(
            headers.get("content-type"),
            Some(&"application/json".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_invalid_url() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let result = client.get("not-a-valid-url", &Headers::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_connection_refused() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let result = client
            .get("http://127.0.0.1:59999/test", &Headers::new())
            .await;
        assert!(matches!(
            result,
            Err(HttpError::ConnectionFailed(_)) | Err(HttpError::Other(_))
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/request/7"))
            .and(header("X-Api-Key", "k"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let mut headers = Headers::new();
        headers.insert("X-Api-Key".to_string(), "k".to_string());
        let response = client
            .delete(&format!("{}/api/v1/request/7", server.uri()), &headers)
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.text_lossy(), "missing");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(100)).unwrap();
        let result = client.get(&server.uri(), &Headers::new()).await;
        assert!(matches!(result, Err(HttpError::Timeout(_))));
    }
}
