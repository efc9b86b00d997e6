//! Pi-hole v5 (`/admin/api.php`) and v6 (`/api`).
//!
//! A Pi-hole widget may hold an `apiToken` or a `password`, never both.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use super::{content_type, expect_success, parse_json, AdapterKind, JSON_CONTENT_TYPE};
use crate::error::{classify, ErrorKind, IntegrationError};
use crate::models::{
    deserialize_nullable_u64, AdBlockSnapshot, CommandOutcome, CommandRequest, DomainSnapshot,
};
use crate::traits::{Credentials, HttpClient, Integration, SessionToken, Target};

pub(crate) const SID_HEADER: &str = "X-FTL-SID";

/// The single configured Pi-hole secret, if any.
enum PiholeSecret<'a> {
    ApiToken(&'a str),
    Password(&'a str),
}

fn pihole_secret(credentials: &Credentials) -> Result<Option<PiholeSecret<'_>>, IntegrationError> {
    match (credentials.secret("apiToken"), credentials.secret("password")) {
        (Some(_), Some(_)) => Err(IntegrationError::validation(
            "Pi-hole takes either an API token or a password, not both",
        )),
        (Some(token), None) => Ok(Some(PiholeSecret::ApiToken(token))),
        (None, Some(password)) => Ok(Some(PiholeSecret::Password(password))),
        (None, None) => Ok(None),
    }
}

/// Pi-hole v5 derives its API token from the web password by hashing twice.
fn v5_token_from_password(password: &str) -> String {
    let hex = |bytes: &[u8]| bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();
    let first = hex(&Sha256::digest(password.as_bytes()));
    hex(&Sha256::digest(first.as_bytes()))
}

/// Bad credentials on a stateless API cannot be fixed by logging in again.
fn classify_stateless(err: &IntegrationError) -> ErrorKind {
    match err.http_status() {
        Some(401) | Some(403) => ErrorKind::AuthInvalid,
        _ => classify(err),
    }
}

#[derive(Debug, Deserialize)]
struct V5Summary {
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    domains_being_blocked: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    dns_queries_today: u64,
    #[serde(default, deserialize_with = "deserialize_nullable_u64")]
    ads_blocked_today: u64,
    #[serde(default)]
    ads_percentage_today: f64,
    #[serde(default)]
    status: String,
}

pub struct PiholeV5Integration {
    http: Arc<dyn HttpClient>,
}

impl PiholeV5Integration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn api(
        &self,
        target: &Target,
        token: &SessionToken,
        query: &str,
    ) -> Result<Value, IntegrationError> {
        let url = token.apply_query(&format!("{}?{}", target.url("/admin/api.php"), query));
        let value: Value = parse_json(self.http.get(&url, token.headers()).await?)?;
        // An invalid token gets an empty array instead of an error status.
        if value.as_array().is_some_and(|a| a.is_empty()) {
            return Err(IntegrationError::LoginRejected {
                message: "Pi-hole rejected the API token".to_string(),
            });
        }
        Ok(value)
    }
}

#[async_trait]
impl Integration for PiholeV5Integration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::PiholeV5
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["enable", "disable"]
    }

    async fn login(
        &self,
        _target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let token = match pihole_secret(credentials)? {
            Some(PiholeSecret::ApiToken(token)) => token.to_string(),
            Some(PiholeSecret::Password(password)) => v5_token_from_password(password),
            None => return Ok(SessionToken::empty()),
        };
        Ok(SessionToken::empty().with_query("auth", token))
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let summary: V5Summary = serde_json::from_value(self.api(target, token, "summaryRaw").await?)
            .map_err(IntegrationError::invalid_response)?;

        Ok(DomainSnapshot::AdBlock(AdBlockSnapshot {
            blocking_enabled: summary.status == "enabled",
            total_queries: summary.dns_queries_today,
            blocked_queries: summary.ads_blocked_today,
            percent_blocked: summary.ads_percentage_today,
            domains_on_blocklist: summary.domains_being_blocked,
        }))
    }

    async fn command(
        &self,
        target: &Target,
        token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        if token.is_empty() {
            return Err(IntegrationError::validation(
                "Pi-hole needs an API token or password to change blocking",
            ));
        }

        let query = match (request.name.as_str(), request.arg_u64("seconds")) {
            ("enable", _) => "enable".to_string(),
            (_, Some(seconds)) if seconds > 0 => format!("disable={}", seconds),
            _ => "disable".to_string(),
        };
        let result = self.api(target, token, &query).await?;
        let status = result.get("status").and_then(Value::as_str).unwrap_or("unknown");
        Ok(CommandOutcome::new(request.name.clone(), 1).with_message(format!("blocking {}", status)))
    }

    fn classify(&self, err: &IntegrationError) -> ErrorKind {
        classify_stateless(err)
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    session: AuthSession,
}

#[derive(Debug, Deserialize)]
struct AuthSession {
    valid: bool,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    validity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct V6Summary {
    #[serde(default)]
    queries: V6Queries,
    #[serde(default)]
    gravity: V6Gravity,
}

#[derive(Debug, Default, Deserialize)]
struct V6Queries {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    blocked: u64,
    #[serde(default)]
    percent_blocked: f64,
}

#[derive(Debug, Default, Deserialize)]
struct V6Gravity {
    #[serde(default)]
    domains_being_blocked: u64,
}

#[derive(Debug, Deserialize)]
struct BlockingStatus {
    blocking: String,
}

pub struct PiholeV6Integration {
    http: Arc<dyn HttpClient>,
}

impl PiholeV6Integration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Integration for PiholeV6Integration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::PiholeV6
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["enable", "disable"]
    }

    async fn login(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        // v6 app passwords are submitted the same way as the web password.
        let password = match pihole_secret(credentials)? {
            Some(PiholeSecret::ApiToken(secret)) | Some(PiholeSecret::Password(secret)) => secret,
            None => return Ok(SessionToken::empty()),
        };

        let body = json!({ "password": password }).to_string();
        let response = self
            .http
            .post(&target.url("/api/auth"), &body, &content_type(JSON_CONTENT_TYPE))
            .await?;
        if response.status == 401 {
            return Err(IntegrationError::LoginRejected {
                message: "Pi-hole rejected the password".to_string(),
            });
        }

        let auth: AuthResponse = parse_json(response)?;
        let sid = match (auth.session.valid, auth.session.sid) {
            (true, Some(sid)) => sid,
            (true, None) => return Ok(SessionToken::empty()),
            (false, _) => {
                return Err(IntegrationError::LoginRejected {
                    message: "Pi-hole rejected the password".to_string(),
                })
            }
        };

        let mut token = SessionToken::empty().with_header(SID_HEADER, sid);
        if let Some(validity) = auth.session.validity.filter(|v| *v > 0) {
            token = token.with_ttl(Duration::from_secs(validity as u64));
        }
        Ok(token)
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let summary: V6Summary = parse_json(
            self.http
                .get(&target.url("/api/stats/summary"), token.headers())
                .await?,
        )?;
        let blocking: BlockingStatus = parse_json(
            self.http
                .get(&target.url("/api/dns/blocking"), token.headers())
                .await?,
        )?;

        Ok(DomainSnapshot::AdBlock(AdBlockSnapshot {
            blocking_enabled: blocking.blocking == "enabled",
            total_queries: summary.queries.total,
            blocked_queries: summary.queries.blocked,
            percent_blocked: summary.queries.percent_blocked,
            domains_on_blocklist: summary.gravity.domains_being_blocked,
        }))
    }

    async fn command(
        &self,
        target: &Target,
        token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        let enable = request.name == "enable";
        let timer = match request.arg_u64("seconds") {
            Some(seconds) if seconds > 0 && !enable => json!(seconds),
            _ => Value::Null,
        };

        let body = json!({ "blocking": enable, "timer": timer }).to_string();
        let headers = token.request_headers(&[("Content-Type", JSON_CONTENT_TYPE)]);
        let response = self
            .http
            .post(&target.url("/api/dns/blocking"), &body, &headers)
            .await?;
        let status: BlockingStatus = expect_success(response)?
            .json()
            .map_err(IntegrationError::invalid_response)?;

        Ok(CommandOutcome::new(request.name.clone(), 1)
            .with_message(format!("blocking {}", status.blocking)))
    }
}
