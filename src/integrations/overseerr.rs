//! Jellyseerr and Overseerr share one request API.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{expect_success, parse_json, AdapterKind};
use crate::error::{classify, ErrorKind, IntegrationError};
use crate::models::{
    deserialize_nullable_u64, CommandOutcome, CommandRequest, DomainSnapshot, MediaRequest,
    MediaRequestSnapshot,
};
use crate::traits::{Credentials, HttpClient, Integration, SessionToken, Target};

const API_KEY_HEADER: &str = "X-Api-Key";
const PENDING_PAGE: usize = 20;

#[derive(Debug, Deserialize)]
struct RequestCount {
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    total: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    pending: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    approved: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    declined: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    processing: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    available: u64,
}

#[derive(Debug, Deserialize)]
struct RequestPage {
    #[serde(default)]
    results: Vec<RequestRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestRow {
    id: u64,
    #[serde(default)]
    #[serde(rename = "type")]
    media_type: Option<String>,
    #[serde(default)]
    media: Option<RequestMedia>,
    #[serde(default)]
    requested_by: Option<RequestUser>,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestMedia {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    tmdb_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl From<RequestRow> for MediaRequest {
    fn from(row: RequestRow) -> Self {
        let media_type = row
            .media_type
            .or_else(|| row.media.as_ref().and_then(|m| m.media_type.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        MediaRequest {
            id: row.id,
            media_type,
            tmdb_id: row.media.and_then(|m| m.tmdb_id),
            requested_by: row
                .requested_by
                .and_then(|u| u.display_name.or(u.username).or(u.email)),
            created_at: row.created_at,
        }
    }
}

pub struct SeerrIntegration {
    kind: AdapterKind,
    http: Arc<dyn HttpClient>,
}

impl SeerrIntegration {
    /// `kind` is either [`AdapterKind::Jellyseerr`] or [`AdapterKind::Overseerr`].
    pub fn new(kind: AdapterKind, http: Arc<dyn HttpClient>) -> Self {
        Self { kind, http }
    }
}

#[async_trait]
impl Integration for SeerrIntegration {
    fn kind(&self) -> AdapterKind {
        self.kind
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["approve", "decline", "delete"]
    }

    async fn login(
        &self,
        _target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let api_key = credentials
            .secret("apiKey")
            .ok_or_else(|| IntegrationError::validation("an API key is required"))?;
        Ok(SessionToken::empty()
            .with_header(API_KEY_HEADER, api_key)
            .with_header("Accept", "application/json"))
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let count: RequestCount = parse_json(
            self.http
                .get(&target.url("/api/v1/request/count"), token.headers())
                .await?,
        )?;
        let url = format!(
            "{}?take={}&skip=0&filter=pending&sort=added",
            target.url("/api/v1/request"),
            PENDING_PAGE
        );
        let page: RequestPage = parse_json(self.http.get(&url, token.headers()).await?)?;

        Ok(DomainSnapshot::MediaRequests(MediaRequestSnapshot {
            total: count.total,
            pending: count.pending,
            approved: count.approved,
            declined: count.declined,
            processing: count.processing,
            available: count.available,
            pending_requests: page.results.into_iter().map(MediaRequest::from).collect(),
        }))
    }

    async fn command(
        &self,
        target: &Target,
        token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        let id = request.require_numeric_id()?;
        let path = format!("/api/v1/request/{}", id);

        let response = match request.name.as_str() {
            "delete" => self.http.delete(&target.url(&path), token.headers()).await?,
            action => {
                let url = target.url(&format!("{}/{}", path, action));
                let headers = token.request_headers(&[("Content-Type", "application/json")]);
                self.http.post(&url, "{}", &headers).await?
            }
        };
        expect_success(response)?;
        Ok(CommandOutcome::new(request.name.clone(), 1).with_message(format!("request {}", id)))
    }

    fn classify(&self, err: &IntegrationError) -> ErrorKind {
        match err.http_status() {
            // The API key is static, so a rejection is final.
            Some(401) | Some(403) => ErrorKind::AuthInvalid,
            _ => classify(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use serde_json::json;

    fn target() -> Target {
        Target::new("w-7", "requests.lan").with_port(5055)
    }

    fn seerr(mock: &MockHttpClient) -> SeerrIntegration {
        SeerrIntegration::new(AdapterKind::Jellyseerr, Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_login_needs_api_key() {
        let integration = seerr(&MockHttpClient::new());
        let err = integration
            .login(&target(), &Credentials::default())
            .await
            .unwrap_err();
        assert_eq!(integration.classify(&err), ErrorKind::ValidationError);

        let token = integration
            .login(&target(), &Credentials::default().with_secret("apiKey", "k"))
            .await
            .unwrap();
        assert_eq!(token.header("x-api-key"), Some("k"));
    }

    #[tokio::test]
    async fn test_poll_counts_and_pending() {
        let mock = MockHttpClient::new();
        mock.set_response(
            "http://requests.lan:5055/api/v1/request/count",
            MockResponse::json(json!({
                "total": 12, "movie": 8, "tv": 4, "pending": 2, "approved": 7,
                "declined": 1, "processing": 1, "available": 5
            })),
        );
        mock.set_response(
            "http://requests.lan:5055/api/v1/request?",
            MockResponse::json(json!({
                "pageInfo": {"pages": 1, "results": 2},
                "results": [
                    {"id": 41, "type": "movie", "createdAt": "2024-05-01T10:00:00.000Z",
                     "media": {"tmdbId": 603, "mediaType": "movie"},
                     "requestedBy": {"displayName": "Sam"}},
                    {"id": 42, "media": {"tmdbId": 1399, "mediaType": "tv"},
                     "requestedBy": {"email": "kid@home.lan"}}
                ]
            })),
        );

        let DomainSnapshot::MediaRequests(snapshot) = seerr(&mock)
            .poll(&target(), &SessionToken::empty())
            .await
            .unwrap()
        else {
            panic!("expected media requests");
        };
        assert_eq!(snapshot.total, 12);
        assert_eq!(snapshot.pending, 2);
        assert_eq!(snapshot.pending_requests.len(), 2);
        assert_eq!(snapshot.pending_requests[0].requested_by.as_deref(), Some("Sam"));
        assert_eq!(snapshot.pending_requests[1].media_type, "tv");
        assert_eq!(snapshot.pending_requests[1].tmdb_id, Some(1399));
    }

    #[tokio::test]
    async fn test_approve_and_delete() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::status(200, "{}"));
        let integration = seerr(&mock);
        let token = SessionToken::empty().with_header(API_KEY_HEADER, "k");

        integration
            .command(&target(), &token, &CommandRequest::new("approve").with_arg("id", 41))
            .await
            .unwrap();
        integration
            .command(&target(), &token, &CommandRequest::new("delete").with_arg("id", "42"))
            .await
            .unwrap();

        let requests = mock.get_requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "http://requests.lan:5055/api/v1/request/41/approve");
        assert_eq!(requests[0].header(API_KEY_HEADER), Some("k"));
        assert_eq!(requests[1].method, "DELETE");
        assert_eq!(requests[1].url, "http://requests.lan:5055/api/v1/request/42");
    }

    #[tokio::test]
    async fn test_bad_key_is_terminal() {
        let mock = MockHttpClient::new();
        mock.set_default_response(MockResponse::status(403, "{\"message\":\"Forbidden\"}"));
        let integration = seerr(&mock);
        let err = integration
            .poll(&target(), &SessionToken::empty())
            .await
            .unwrap_err();
        assert_eq!(integration.classify(&err), ErrorKind::AuthInvalid);
    }
}
