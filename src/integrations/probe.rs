//! Reachability probes: an HTTP GET and a single ICMP echo.
//!
//! Neither probe logs in. An unreachable target is a successful poll with
//! `reachable: false`, not an error.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::AdapterKind;
use crate::error::IntegrationError;
use crate::models::{CommandOutcome, CommandRequest, DomainSnapshot, ReachabilitySnapshot};
use crate::traits::{Credentials, Headers, HttpClient, Integration, SessionToken, Target};

static PING_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time[=<]\s*([\d.]+)\s*ms").expect("Invalid ping time regex"));

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// HTTP reachability. Runs over a client that accepts self-signed certificates.
pub struct HttpProbeIntegration {
    http: Arc<dyn HttpClient>,
}

impl HttpProbeIntegration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Base URL plus the optional `path` widget option.
    fn probe_url(target: &Target) -> String {
        match target.option_str("path") {
            Some(path) => target.url(path),
            None => target.base_url(),
        }
    }
}

#[async_trait]
impl Integration for HttpProbeIntegration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::HttpProbe
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &[]
    }

    async fn login(
        &self,
        _target: &Target,
        _credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        Ok(SessionToken::empty())
    }

    async fn poll(
        &self,
        target: &Target,
        _token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let url = Self::probe_url(target);
        let start = Instant::now();
        let snapshot = match self.http.get(&url, &Headers::new()).await {
            Ok(response) => ReachabilitySnapshot {
                target: url,
                reachable: true,
                status_code: Some(response.status),
                latency_ms: Some(elapsed_ms(start)),
            },
            Err(err) => {
                tracing::debug!(widget_id = %target.widget_id, error = %err, "HTTP probe failed");
                ReachabilitySnapshot {
                    target: url,
                    reachable: false,
                    status_code: None,
                    latency_ms: None,
                }
            }
        };
        Ok(DomainSnapshot::Reachability(snapshot))
    }

    async fn command(
        &self,
        _target: &Target,
        _token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        Err(IntegrationError::UnsupportedCommand {
            command: request.name.clone(),
        })
    }
}

/// ICMP reachability through the system `ping`.
pub struct IcmpProbeIntegration {
    timeout: Duration,
}

impl IcmpProbeIntegration {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn ping(&self, host: &str) -> Result<Option<f64>, IntegrationError> {
        let wait_secs = self.timeout.as_secs().max(1).to_string();
        let start = Instant::now();
        let child = Command::new("ping")
            .args(["-n", "-c", "1", "-W", &wait_secs, host])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout + Duration::from_secs(1), child).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(IntegrationError::Unreachable {
                    target: host.to_string(),
                    message: format!("failed to run ping: {}", err),
                })
            }
            Err(_) => return Ok(None),
        };

        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Some(parse_ping_latency(&stdout).unwrap_or_else(|| elapsed_ms(start))))
    }
}

/// Round-trip time from `ping` output, in milliseconds.
fn parse_ping_latency(output: &str) -> Option<f64> {
    PING_TIME
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[async_trait]
impl Integration for IcmpProbeIntegration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::IcmpProbe
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &[]
    }

    async fn login(
        &self,
        _target: &Target,
        _credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        Ok(SessionToken::empty())
    }

    async fn poll(
        &self,
        target: &Target,
        _token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let host = target.bare_host();
        if host.is_empty() || host.starts_with('-') {
            return Err(IntegrationError::validation("probe host is not a valid hostname"));
        }
        let latency = self.ping(&host).await?;
        Ok(DomainSnapshot::Reachability(ReachabilitySnapshot {
            target: host,
            reachable: latency.is_some(),
            status_code: None,
            latency_ms: latency,
        }))
    }

    async fn command(
        &self,
        _target: &Target,
        _token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        Err(IntegrationError::UnsupportedCommand {
            command: request.name.clone(),
        })
    }
}
