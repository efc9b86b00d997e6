//! qBittorrent Web API (v2).

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{content_type, expect_success, form_body, parse_json, AdapterKind, FORM_CONTENT_TYPE};
use crate::error::IntegrationError;
use crate::models::{
    CommandOutcome, CommandRequest, DomainSnapshot, TorrentItem, TorrentSnapshot, TorrentState,
    TransferStats,
};
use crate::traits::{Credentials, HttpClient, Integration, Response, SessionToken, Target};

/// qBittorrent reports "unknown" ETA as 100 days.
const ETA_INFINITY: u64 = 8_640_000;

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    name: String,
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    dlspeed: u64,
    #[serde(default)]
    upspeed: u64,
    #[serde(default)]
    eta: u64,
    #[serde(default)]
    ratio: f64,
}

#[derive(Debug, Deserialize)]
struct TransferInfo {
    #[serde(default)]
    dl_info_speed: u64,
    #[serde(default)]
    up_info_speed: u64,
}

pub struct QbittorrentIntegration {
    http: Arc<dyn HttpClient>,
}

impl QbittorrentIntegration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// qBittorrent answers 403 to API calls once the SID is no longer valid.
    fn check_api(response: Response) -> Result<Response, IntegrationError> {
        if response.status == 403 {
            return Err(IntegrationError::SessionExpired {
                message: "qBittorrent rejected the SID".to_string(),
            });
        }
        expect_success(response)
    }

    async fn api_get(
        &self,
        target: &Target,
        token: &SessionToken,
        path: &str,
    ) -> Result<Response, IntegrationError> {
        let response = self.http.get(&target.url(path), token.headers()).await?;
        Self::check_api(response)
    }

    async fn api_post(
        &self,
        target: &Target,
        token: &SessionToken,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<Response, IntegrationError> {
        let headers = token.request_headers(&[("Content-Type", FORM_CONTENT_TYPE)]);
        let response = self
            .http
            .post(&target.url(path), &form_body(fields), &headers)
            .await?;
        Self::check_api(response)
    }

    /// qBittorrent 5 renamed `pause`/`resume` to `stop`/`start`; try the
    /// legacy name first and fall back on 404.
    async fn post_renamed(
        &self,
        target: &Target,
        token: &SessionToken,
        legacy: &str,
        current: &str,
        fields: &[(&str, &str)],
    ) -> Result<(), IntegrationError> {
        match self.api_post(target, token, legacy, fields).await {
            Ok(_) => Ok(()),
            Err(IntegrationError::Status { status: 404, .. }) => {
                self.api_post(target, token, current, fields).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

fn map_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "forcedMetaDL" => TorrentState::Downloading,
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" | "allocating" => {
            TorrentState::Checking
        }
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

impl From<TorrentInfo> for TorrentItem {
    fn from(info: TorrentInfo) -> Self {
        TorrentItem {
            state: map_state(&info.state),
            id: info.hash,
            name: info.name,
            progress: info.progress.clamp(0.0, 1.0),
            size_bytes: info.size,
            download_rate: info.dlspeed,
            upload_rate: info.upspeed,
            eta_secs: (info.eta < ETA_INFINITY).then_some(info.eta),
            ratio: info.ratio,
        }
    }
}

#[async_trait]
impl Integration for QbittorrentIntegration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Qbittorrent
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["pause", "resume", "delete"]
    }

    async fn login(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let username = credentials.username.as_deref().unwrap_or_default();
        let password = credentials.secret("password").unwrap_or_default();
        let base = target.base_url();

        let mut headers = content_type(FORM_CONTENT_TYPE);
        headers.insert("Referer".to_string(), base.clone());
        let response = self
            .http
            .post(
                &target.url("/api/v2/auth/login"),
                &form_body(&[("username", username), ("password", password)]),
                &headers,
            )
            .await?;
        let response = expect_success(response)?;

        if response.text_lossy().trim() != "Ok." {
            return Err(IntegrationError::LoginRejected {
                message: "qBittorrent rejected the username or password".to_string(),
            });
        }

        let sid = response
            .cookie("SID")
            .ok_or_else(|| IntegrationError::invalid_response("login response set no SID cookie"))?;
        Ok(SessionToken::empty()
            .with_header("Cookie", format!("SID={}", sid))
            .with_header("Referer", base))
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let infos: Vec<TorrentInfo> =
            parse_json(self.api_get(target, token, "/api/v2/torrents/info").await?)?;
        let transfer: TransferInfo =
            parse_json(self.api_get(target, token, "/api/v2/transfer/info").await?)?;

        let torrents: Vec<TorrentItem> = infos.into_iter().map(TorrentItem::from).collect();
        let stats = TransferStats::tally(&torrents, transfer.dl_info_speed, transfer.up_info_speed);
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
        let hashes = ids.join("|");
        let hashes = hashes.as_str();

        match request.name.as_str() {
            "pause" => {
                self.post_renamed(
                    target,
                    token,
                    "/api/v2/torrents/pause",
                    "/api/v2/torrents/stop",
                    &[("hashes", hashes)],
                )
                .await?
            }
            "resume" => {
                self.post_renamed(
                    target,
                    token,
                    "/api/v2/torrents/resume",
                    "/api/v2/torrents/start",
                    &[("hashes", hashes)],
                )
                .await?
            }
            _ => {
                let delete_files = request.arg_bool("deleteFiles").unwrap_or(false);
                self.api_post(
                    target,
                    token,
                    "/api/v2/torrents/delete",
                    &[
                        ("hashes", hashes),
                        ("deleteFiles", if delete_files { "true" } else { "false" }),
                    ],
                )
                .await?;
            }
        }

        Ok(CommandOutcome::new(request.name.clone(), ids.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use serde_json::json;

    const BASE: &str = "http://nas.local:8080";

    fn setup() -> (MockHttpClient, QbittorrentIntegration, Target) {
        let mock = MockHttpClient::new();
        let integration = QbittorrentIntegration::new(Arc::new(mock.clone()));
        let target = Target::new("w-1", "nas.local").with_port(8080);
        (mock, integration, target)
    }

    fn token() -> SessionToken {
        SessionToken::empty().with_header("Cookie", "SID=abc")
    }

    #[tokio::test]
    async fn test_login_reads_sid_cookie() {
        let (mock, integration, target) = setup();
        mock.set_response(
            &format!("{BASE}/api/v2/auth/login"),
            MockResponse::with_header(200, "set-cookie", "SID=abc123; HttpOnly; path=/", "Ok."),
        );

        let creds = Credentials::new(Some("admin".to_string())).with_secret("password", "p&ss");
        let token = integration.login(&target, &creds).await.unwrap();
        assert_eq!(token.header("Cookie"), Some("SID=abc123"));

        let request = &mock.get_requests()[0];
        assert_eq!(request.body.as_deref(), Some("username=admin&password=p%26ss"));
        assert_eq!(request.header("Referer"), Some(BASE));
    }

    #[tokio::test]
    async fn test_login_fails_body_is_rejection() {
        let (mock, integration, target) = setup();
        mock.set_response(
            &format!("{BASE}/api/v2/auth/login"),
            MockResponse::status(200, "Fails."),
        );
        let err = integration
            .login(&target, &Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::LoginRejected { .. }));
    }

    #[tokio::test]
    async fn test_poll_maps_torrents() {
        let (mock, integration, target) = setup();
        mock.set_response(
            &format!("{BASE}/api/v2/torrents/info"),
            MockResponse::json(json!([
                {"hash": "h1", "name": "debian.iso", "state": "downloading", "progress": 0.25,
                 "size": 1000, "dlspeed": 50, "upspeed": 5, "eta": 60, "ratio": 0.1},
                {"hash": "h2", "name": "ubuntu.iso", "state": "stoppedUP", "progress": 1.0,
                 "size": 2000, "dlspeed": 0, "upspeed": 0, "eta": 8640000, "ratio": 2.0}
            ])),
        );
        mock.set_response(
            &format!("{BASE}/api/v2/transfer/info"),
            MockResponse::json(json!({"dl_info_speed": 50, "up_info_speed": 5})),
        );

        let DomainSnapshot::Torrents(snapshot) = integration.poll(&target, &token()).await.unwrap()
        else {
            panic!("expected torrents");
        };
        assert_eq!(snapshot.torrents.len(), 2);
        assert_eq!(snapshot.torrents[0].state, TorrentState::Downloading);
        assert_eq!(snapshot.torrents[0].eta_secs, Some(60));
        assert_eq!(snapshot.torrents[1].state, TorrentState::Paused);
        assert_eq!(snapshot.torrents[1].eta_secs, None);
        assert_eq!(snapshot.stats.downloading, 1);
        assert_eq!(snapshot.stats.download_rate, 50);

        let requests = mock.get_requests();
        assert_eq!(requests[0].header("Cookie"), Some("SID=abc"));
    }

    #[tokio::test]
    async fn test_forbidden_means_session_expired() {
        let (mock, integration, target) = setup();
        mock.set_response(
            &format!("{BASE}/api/v2/torrents/info"),
            MockResponse::status(403, "Forbidden"),
        );
        let err = integration.poll(&target, &token()).await.unwrap_err();
        assert!(matches!(err, IntegrationError::SessionExpired { .. }));
        assert_eq!(
            integration.classify(&err),
            crate::error::ErrorKind::AuthExpired
        );
    }

    #[tokio::test]
    async fn test_pause_falls_back_to_stop() {
        let (mock, integration, target) = setup();
        mock.set_response(
            &format!("{BASE}/api/v2/torrents/pause"),
            MockResponse::status(404, "Not Found"),
        );
        mock.set_response(
            &format!("{BASE}/api/v2/torrents/stop"),
            MockResponse::status(200, ""),
        );

        let request = CommandRequest::new("pause").with_arg("ids", json!(["h1", "h2"]));
        let outcome = integration.command(&target, &token(), &request).await.unwrap();
        assert_eq!(outcome.affected, 2);

        let stop = mock.requests_to(&format!("{BASE}/api/v2/torrents/stop"));
        assert_eq!(stop[0].body.as_deref(), Some("hashes=h1%7Ch2"));
    }

    #[tokio::test]
    async fn test_delete_passes_delete_files() {
        let (mock, integration, target) = setup();
        mock.set_response(
            &format!("{BASE}/api/v2/torrents/delete"),
            MockResponse::status(200, ""),
        );
        let request = CommandRequest::new("delete")
            .with_arg("id", "h1")
            .with_arg("deleteFiles", true);
        integration.command(&target, &token(), &request).await.unwrap();
        assert_eq!(
            mock.get_requests()[0].body.as_deref(),
            Some("hashes=h1&deleteFiles=true")
        );
    }
}
