//! Deluge Web UI JSON-RPC (`/json`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{expect_success, AdapterKind, JSON_CONTENT_TYPE};
use crate::error::IntegrationError;
use crate::models::{
    CommandOutcome, CommandRequest, DomainSnapshot, TorrentItem, TorrentSnapshot, TorrentState,
    TransferStats,
};
use crate::traits::{Credentials, HttpClient, Integration, SessionToken, Target};

/// RPC error code Deluge uses for "Not authenticated".
const NOT_AUTHENTICATED: i64 = 1;

const TORRENT_FIELDS: [&str; 8] = [
    "name",
    "state",
    "progress",
    "total_size",
    "download_payload_rate",
    "upload_payload_rate",
    "eta",
    "ratio",
];

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
struct UiUpdate {
    #[serde(default)]
    torrents: Option<HashMap<String, TorrentStatus>>,
    #[serde(default)]
    stats: Option<UiStats>,
}

#[derive(Debug, Deserialize)]
struct TorrentStatus {
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
    /// Percent, `0..=100`.
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    download_payload_rate: f64,
    #[serde(default)]
    upload_payload_rate: f64,
    #[serde(default)]
    eta: f64,
    #[serde(default)]
    ratio: f64,
}

#[derive(Debug, Default, Deserialize)]
struct UiStats {
    #[serde(default)]
    download_rate: f64,
    #[serde(default)]
    upload_rate: f64,
}

pub struct DelugeIntegration {
    http: Arc<dyn HttpClient>,
    request_id: AtomicU64,
}

impl DelugeIntegration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            request_id: AtomicU64::new(1),
        }
    }

    /// Call one RPC method and return its `result`.
    async fn call(
        &self,
        target: &Target,
        token: &SessionToken,
        method: &str,
        params: Value,
    ) -> Result<(Value, Option<String>), IntegrationError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "method": method, "params": params, "id": id }).to_string();
        let headers = token.request_headers(&[("Content-Type", JSON_CONTENT_TYPE)]);

        let response = self.http.post(&target.url("/json"), &body, &headers).await?;
        let response = expect_success(response)?;
        let session_cookie = response.cookie("_session_id");
        let rpc: RpcResponse = response.json().map_err(IntegrationError::invalid_response)?;

        match rpc.error {
            Some(err) if err.code == NOT_AUTHENTICATED => Err(IntegrationError::SessionExpired {
                message: err.message,
            }),
            Some(err) => Err(IntegrationError::invalid_response(format!(
                "{} failed: {}",
                method, err.message
            ))),
            None => Ok((rpc.result, session_cookie)),
        }
    }

    /// Make sure the Web UI is connected to a daemon, connecting to the first
    /// configured host if it is not.
    async fn ensure_connected(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<(), IntegrationError> {
        let (connected, _) = self.call(target, token, "web.connected", json!([])).await?;
        if connected.as_bool() == Some(true) {
            return Ok(());
        }

        let (hosts, _) = self.call(target, token, "web.get_hosts", json!([])).await?;
        let host_id = hosts
            .as_array()
            .and_then(|hosts| hosts.first())
            .and_then(|host| host.get(0))
            .and_then(Value::as_str)
            .ok_or_else(|| IntegrationError::validation("Deluge Web UI has no daemon configured"))?
            .to_string();
        tracing::debug!(widget_id = %target.widget_id, "Connecting Deluge Web UI to daemon");
        self.call(target, token, "web.connect", json!([host_id])).await?;
        Ok(())
    }
}

fn map_state(state: &str) -> TorrentState {
    match state {
        "Downloading" => TorrentState::Downloading,
        "Seeding" => TorrentState::Seeding,
        "Paused" => TorrentState::Paused,
        "Checking" | "Allocating" | "Moving" => TorrentState::Checking,
        "Queued" => TorrentState::Queued,
        "Error" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

fn to_item(id: String, status: TorrentStatus) -> TorrentItem {
    TorrentItem {
        id,
        state: map_state(&status.state),
        name: status.name,
        progress: (status.progress / 100.0).clamp(0.0, 1.0),
        size_bytes: status.total_size,
        download_rate: status.download_payload_rate.max(0.0) as u64,
        upload_rate: status.upload_payload_rate.max(0.0) as u64,
        eta_secs: (status.eta > 0.0).then_some(status.eta as u64),
        ratio: status.ratio.max(0.0),
    }
}

#[async_trait]
impl Integration for DelugeIntegration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Deluge
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["pause", "resume", "delete"]
    }

    async fn login(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let password = credentials.secret("password").unwrap_or_default();
        let (result, cookie) = self
            .call(target, &SessionToken::empty(), "auth.login", json!([password]))
            .await?;

        if result.as_bool() != Some(true) {
            return Err(IntegrationError::LoginRejected {
                message: "Deluge rejected the password".to_string(),
            });
        }
        let session_id = cookie.ok_or_else(|| {
            IntegrationError::invalid_response("login response set no _session_id cookie")
        })?;

        let token = SessionToken::empty().with_header("Cookie", format!("_session_id={}", session_id));
        self.ensure_connected(target, &token).await?;
        Ok(token)
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let (result, _) = self
            .call(target, token, "web.update_ui", json!([TORRENT_FIELDS, {}]))
            .await?;
        let update: UiUpdate =
            serde_json::from_value(result).map_err(IntegrationError::invalid_response)?;

        let mut torrents: Vec<TorrentItem> = update
            .torrents
            .unwrap_or_default()
            .into_iter()
            .map(|(id, status)| to_item(id, status))
            .collect();
        torrents.sort_by(|a, b| a.name.cmp(&b.name));

        let stats = update.stats.unwrap_or_default();
        let stats = TransferStats::tally(
            &torrents,
            stats.download_rate.max(0.0) as u64,
            stats.upload_rate.max(0.0) as u64,
        );
        Ok(DomainSnapshot::Torrents(TorrentSnapshot { torrents, stats }))
    }

    async fn command(
        &self,
        target: &Target,
        token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        let ids = request.require_ids()?;

        match request.name.as_str() {
            "pause" => {
                self.call(target, token, "core.pause_torrent", json!([ids]))
                    .await?;
            }
            "resume" => {
                self.call(target, token, "core.resume_torrent", json!([ids]))
                    .await?;
            }
            _ => {
                let remove_data = request.arg_bool("deleteFiles").unwrap_or(false);
                for id in &ids {
                    self.call(target, token, "core.remove_torrent", json!([id, remove_data]))
                        .await?;
                }
            }
        }

        Ok(CommandOutcome::new(request.name.clone(), ids.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::error::ErrorKind;

    const URL: &str = "http://nas.local:8112/json";

    fn setup() -> (MockHttpClient, DelugeIntegration, Target) {
        let mock = MockHttpClient::new();
        let integration = DelugeIntegration::new(Arc::new(mock.clone()));
        let target = Target::new("w-2", "nas.local").with_port(8112);
        (mock, integration, target)
    }

    #[tokio::test]
    async fn test_login_and_connect() {
        let (mock, integration, target) = setup();
        mock.push_response(
            URL,
            MockResponse::with_header(
                200,
                "set-cookie",
                "_session_id=deadbeef; Path=/json",
                r#"{"result": true, "error": null, "id": 1}"#,
            ),
        );
        mock.push_response(URL, MockResponse::json(json!({"result": true, "error": null})));

        let creds = Credentials::default().with_secret("password", "deluge");
        let token = integration.login(&target, &creds).await.unwrap();
        assert_eq!(token.header("Cookie"), Some("_session_id=deadbeef"));

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 2);
        let login: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(login["method"], "auth.login");
        assert_eq!(login["params"][0], "deluge");
        assert_eq!(requests[1].header("Cookie"), Some("_session_id=deadbeef"));
    }

    #[tokio::test]
    async fn test_login_false_is_rejection() {
        let (mock, integration, target) = setup();
        mock.push_response(URL, MockResponse::json(json!({"result": false, "error": null})));
        let err = integration
            .login(&target, &Credentials::default())
            .await
            .unwrap_err();
        assert_eq!(integration.classify(&err), ErrorKind::AuthInvalid);
    }

    #[tokio::test]
    async fn test_not_authenticated_is_expiry() {
        let (mock, integration, target) = setup();
        mock.push_response(
            URL,
            MockResponse::json(json!({
                "result": null,
                "error": {"message": "Not authenticated", "code": 1}
            })),
        );
        let err = integration
            .poll(&target, &SessionToken::empty())
            .await
            .unwrap_err();
        assert_eq!(integration.classify(&err), ErrorKind::AuthExpired);
    }

    #[tokio::test]
    async fn test_poll_maps_update_ui() {
        let (mock, integration, target) = setup();
        mock.push_response(
            URL,
            MockResponse::json(json!({
                "result": {
                    "connected": true,
                    "torrents": {
                        "abc": {"name": "b.iso", "state": "Seeding", "progress": 100.0,
                                "total_size": 10, "download_payload_rate": 0.0,
                                "upload_payload_rate": 12.0, "eta": 0, "ratio": 1.5},
                        "def": {"name": "a.iso", "state": "Downloading", "progress": 40.0,
                                "total_size": 20, "download_payload_rate": 100.0,
                                "upload_payload_rate": 0.0, "eta": 30, "ratio": 0.0}
                    },
                    "stats": {"download_rate": 100.0, "upload_rate": 12.0}
                },
                "error": null
            })),
        );

        let DomainSnapshot::Torrents(snapshot) = integration
            .poll(&target, &SessionToken::empty())
            .await
            .unwrap()
        else {
            panic!("expected torrents");
        };
        assert_eq!(snapshot.torrents[0].id, "def");
        assert!((snapshot.torrents[0].progress - 0.4).abs() < f64::EPSILON);
        assert_eq!(snapshot.torrents[0].eta_secs, Some(30));
        assert_eq!(snapshot.torrents[1].state, TorrentState::Seeding);
        assert_eq!(snapshot.stats.upload_rate, 12);
    }

    #[tokio::test]
    async fn test_delete_removes_each_torrent() {
        let (mock, integration, target) = setup();
        mock.set_response(URL, MockResponse::json(json!({"result": true, "error": null})));

        let request = CommandRequest::new("delete")
            .with_arg("ids", json!(["a", "b"]))
            .with_arg("deleteFiles", true);
        let outcome = integration
            .command(&target, &SessionToken::empty(), &request)
            .await
            .unwrap();
        assert_eq!(outcome.affected, 2);

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 2);
        let body: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["method"], "core.remove_torrent");
        assert_eq!(body["params"], json!(["b", true]));
    }
}
