//! Transmission RPC (`/transmission/rpc`).
//!
//! Every request carries `X-Transmission-Session-Id`. Transmission answers
//! 409 with a fresh id when the one sent is missing or stale; at login that is
//! the handshake, on any later call it means the session expired.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{expect_success, AdapterKind, JSON_CONTENT_TYPE};
use crate::error::IntegrationError;
use crate::models::{
    deserialize_id, CommandOutcome, CommandRequest, DomainSnapshot, TorrentItem, TorrentSnapshot,
    TorrentState, TransferStats,
};
use crate::traits::{Credentials, HttpClient, Integration, Response, SessionToken, Target};

pub(crate) const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const TORRENT_FIELDS: [&str; 10] = [
    "id",
    "name",
    "status",
    "percentDone",
    "totalSize",
    "rateDownload",
    "rateUpload",
    "eta",
    "uploadRatio",
    "error",
];

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<TorrentFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TorrentFields {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    percent_done: f64,
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    rate_download: u64,
    #[serde(default)]
    rate_upload: u64,
    #[serde(default)]
    eta: i64,
    #[serde(default)]
    upload_ratio: f64,
    #[serde(default)]
    error: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionStats {
    #[serde(default)]
    download_speed: u64,
    #[serde(default)]
    upload_speed: u64,
}

pub struct TransmissionIntegration {
    http: Arc<dyn HttpClient>,
}

impl TransmissionIntegration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    fn rpc_url(target: &Target) -> String {
        match target.option_str("rpcPath") {
            Some(path) => target.url(path),
            None => target.url("/transmission/rpc"),
        }
    }

    async fn send(
        &self,
        target: &Target,
        token: &SessionToken,
        body: &str,
    ) -> Result<Response, IntegrationError> {
        let headers = token.request_headers(&[("Content-Type", JSON_CONTENT_TYPE)]);
        Ok(self.http.post(&Self::rpc_url(target), body, &headers).await?)
    }

    async fn rpc(
        &self,
        target: &Target,
        token: &SessionToken,
        method: &str,
        arguments: Value,
    ) -> Result<Value, IntegrationError> {
        let body = json!({ "method": method, "arguments": arguments }).to_string();
        let response = self.send(target, token, &body).await?;
        if response.status == 409 {
            return Err(IntegrationError::SessionExpired {
                message: "Transmission session id is stale".to_string(),
            });
        }

        let rpc: RpcResponse = expect_success(response)?
            .json()
            .map_err(IntegrationError::invalid_response)?;
        if rpc.result != "success" {
            return Err(IntegrationError::invalid_response(format!(
                "{} failed: {}",
                method, rpc.result
            )));
        }
        Ok(rpc.arguments)
    }
}

fn map_status(status: i64, error: i64) -> TorrentState {
    if error != 0 {
        return TorrentState::Error;
    }
    match status {
        0 => TorrentState::Paused,
        1 | 2 => TorrentState::Checking,
        3 | 5 => TorrentState::Queued,
        4 => TorrentState::Downloading,
        6 => TorrentState::Seeding,
        _ => TorrentState::Unknown,
    }
}

impl From<TorrentFields> for TorrentItem {
    fn from(t: TorrentFields) -> Self {
        TorrentItem {
            state: map_status(t.status, t.error),
            id: t.id,
            name: t.name,
            progress: t.percent_done.clamp(0.0, 1.0),
            size_bytes: t.total_size,
            download_rate: t.rate_download,
            upload_rate: t.rate_upload,
            // -1 and -2 mean "not available" and "unknown".
            eta_secs: u64::try_from(t.eta).ok(),
            ratio: t.upload_ratio.max(0.0),
        }
    }
}

/// Numeric ids go over the wire as numbers; anything else (hashes) as strings.
fn wire_ids(ids: &[String]) -> Vec<Value> {
    ids.iter()
        .map(|id| match id.parse::<u64>() {
            Ok(n) => json!(n),
            Err(_) => json!(id),
        })
        .collect()
}

#[async_trait]
impl Integration for TransmissionIntegration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Transmission
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["pause", "resume", "delete"]
    }

    async fn login(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let mut token = SessionToken::empty();
        if let Some(username) = credentials.username.as_deref().filter(|u| !u.is_empty()) {
            let password = credentials.secret("password").unwrap_or_default();
            let basic = STANDARD.encode(format!("{}:{}", username, password));
            token = token.with_header("Authorization", format!("Basic {}", basic));
        }

        let probe = json!({ "method": "session-get", "arguments": { "fields": ["version"] } })
            .to_string();
        let response = self.send(target, &token, &probe).await?;

        let response = if response.status == 409 {
            let session_id = response
                .header(SESSION_HEADER)
                .ok_or_else(|| IntegrationError::invalid_response("409 without a session id"))?
                .to_string();
            token = token.with_header(SESSION_HEADER, session_id);
            self.send(target, &token, &probe).await?
        } else {
            response
        };

        if response.status == 401 {
            return Err(IntegrationError::LoginRejected {
                message: "Transmission rejected the username or password".to_string(),
            });
        }
        expect_success(response)?;
        Ok(token)
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let list = self
            .rpc(target, token, "torrent-get", json!({ "fields": TORRENT_FIELDS }))
            .await?;
        let list: TorrentList =
            serde_json::from_value(list).map_err(IntegrationError::invalid_response)?;
        let stats = self.rpc(target, token, "session-stats", json!({})).await?;
        let stats: SessionStats =
            serde_json::from_value(stats).map_err(IntegrationError::invalid_response)?;

        let torrents: Vec<TorrentItem> = list.torrents.into_iter().map(TorrentItem::from).collect();
        let stats = TransferStats::tally(&torrents, stats.download_speed, stats.upload_speed);
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
        let wire = wire_ids(&ids);

        let (method, arguments) = match request.name.as_str() {
            "pause" => ("torrent-stop", json!({ "ids": wire })),
            "resume" => ("torrent-start", json!({ "ids": wire })),
            _ => (
                "torrent-remove",
                json!({
                    "ids": wire,
                    "delete-local-data": request.arg_bool("deleteFiles").unwrap_or(false),
                }),
            ),
        };
        self.rpc(target, token, method, arguments).await?;
        Ok(CommandOutcome::new(request.name.clone(), ids.len()))
    }
}
