//! Integration trait abstraction.
//!
//! An [`Integration`] knows how to authenticate against one kind of service,
//! read a snapshot from it, and run the commands it supports. Integrations are
//! stateless: the session manager owns the [`SessionToken`] between calls and
//! hands it back on every operation.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::http::Headers;
use crate::error::{classify, ErrorKind, IntegrationError};
use crate::integrations::AdapterKind;
use crate::models::{CommandOutcome, CommandRequest, DomainSnapshot};

/// Where a widget's service lives, built from the non-secret configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub widget_id: String,
    pub host: String,
    pub port: Option<u16>,
    pub ssl: bool,
    pub options: Map<String, Value>,
}

impl Target {
    pub fn new(widget_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            host: host.into(),
            port: None,
            ssl: false,
            options: Map::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// `scheme://host[:port][/path]` without a trailing slash.
    ///
    /// `ssl` picks the scheme unless `host` already carries one, and `port` is
    /// appended unless `host` already names a port.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        let (scheme, rest) = match host.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest),
            None => {
                let scheme = if self.ssl { "https" } else { "http" };
                (scheme.to_string(), host)
            }
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        match self.port {
            Some(port) if !has_explicit_port(authority) => {
                format!("{}://{}:{}{}", scheme, authority, port, path)
            }
            _ => format!("{}://{}{}", scheme, authority, path),
        }
    }

    /// Join `path` onto [`Target::base_url`].
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Host name without scheme, port or path, as used by the ICMP probe.
    pub fn bare_host(&self) -> String {
        let host = self.host.trim();
        let rest = host.split_once("://").map_or(host, |(_, rest)| rest);
        let authority = rest.split('/').next().unwrap_or(rest);
        if let Some(stripped) = authority.strip_prefix('[') {
            return stripped.split(']').next().unwrap_or(stripped).to_string();
        }
        match authority.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
            _ => authority.to_string(),
        }
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(Value::as_bool)
    }
}

fn has_explicit_port(authority: &str) -> bool {
    let after_ipv6 = match authority.rfind(']') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };
    match after_ipv6.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Decrypted credentials for one login attempt.
///
/// Values are held as [`SecretString`] and only exposed at the point where an
/// adapter writes them into a request.
#[derive(Default)]
pub struct Credentials {
    pub username: Option<String>,
    secrets: BTreeMap<String, SecretString>,
}

impl Credentials {
    pub fn new(username: Option<String>) -> Self {
        Self {
            username,
            secrets: BTreeMap::new(),
        }
    }

    pub fn with_secret(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, SecretString::from(value.into()));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: SecretString) {
        self.secrets.insert(field.into(), value);
    }

    /// Plaintext of a secret field, if set.
    pub fn secret(&self, field: &str) -> Option<&str> {
        self.secrets.get(field).map(|s| s.expose_secret())
    }

    pub fn has_secret(&self, field: &str) -> bool {
        self.secrets.contains_key(field)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Opaque session material returned by a login.
///
/// Depending on the service this is a cookie header, a bearer or API-key
/// header, query parameters, or nothing at all.
#[derive(Clone, Default, PartialEq)]
pub struct SessionToken {
    headers: Headers,
    query: Vec<(String, String)>,
    ttl: Option<Duration>,
}

impl SessionToken {
    /// Token for services that need no session material.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Lifetime announced by the service at login.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query.is_empty()
    }

    /// Session headers merged with request-specific ones.
    pub fn request_headers(&self, extra: &[(&str, &str)]) -> Headers {
        let mut headers = self.headers.clone();
        for (name, value) in extra {
            headers.insert(name.to_string(), value.to_string());
        }
        headers
    }

    /// Append the session query parameters to `url`.
    pub fn apply_query(&self, url: &str) -> String {
        if self.query.is_empty() {
            return url.to_string();
        }
        let params = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let sep = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, sep, params)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        f.debug_struct("SessionToken")
            .field("headers", &names)
            .field(
                "query",
                &self.query.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Trait for one kind of third-party service.
///
/// Implementations return raw [`IntegrationError`]s; the session layer turns
/// them into classified errors through [`Integration::classify`].
#[async_trait]
pub trait Integration: Send + Sync {
    /// The adapter kind this integration serves.
    fn kind(&self) -> AdapterKind;

    /// Command names accepted by [`Integration::command`].
    fn supported_commands(&self) -> &'static [&'static str];

    /// Authenticate and return session material.
    async fn login(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError>;

    /// Read the current snapshot.
    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError>;

    /// Run a user-triggered command.
    async fn command(
        &self,
        target: &Target,
        token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError>;

    /// Map a raw failure into the shared taxonomy.
    fn classify(&self, err: &IntegrationError) -> ErrorKind {
        classify(err)
    }

    /// Reject commands this integration does not know.
    fn check_command(&self, request: &CommandRequest) -> Result<(), IntegrationError> {
        if self.supported_commands().contains(&request.name.as_str()) {
            Ok(())
        } else {
            Err(IntegrationError::UnsupportedCommand {
                command: request.name.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_scheme_from_ssl() {
        let target = Target::new("w-1", "nas.local").with_port(8080);
        assert_eq!(target.base_url(), "http://nas.local:8080");
        assert_eq!(target.clone().with_ssl(true).base_url(), "https://nas.local:8080");
    }

    #[test]
    fn test_base_url_respects_existing_scheme_and_port() {
        let target = Target::new("w-1", "https://pi.hole:8443/").with_port(80);
        assert_eq!(target.base_url(), "https://pi.hole:8443");

        let target = Target::new("w-1", "http://nas.local/transmission").with_port(9091);
        assert_eq!(target.base_url(), "http://nas.local:9091/transmission");

        let target = Target::new("w-1", "[::1]").with_port(8112);
        assert_eq!(target.base_url(), "http://[::1]:8112");
    }

    #[test]
    fn test_url_join() {
        let target = Target::new("w-1", "nas.local");
        assert_eq!(target.url("/api/v2/app/version"), "http://nas.local/api/v2/app/version");
    }

    #[test]
    fn test_bare_host() {
        assert_eq!(Target::new("w", "https://router.lan:8443/x").bare_host(), "router.lan");
        assert_eq!(Target::new("w", "10.0.0.1").bare_host(), "10.0.0.1");
        assert_eq!(Target::new("w", "[fe80::1]:80").bare_host(), "fe80::1");
    }

    #[test]
    fn test_session_token_query() {
        let token = SessionToken::empty().with_query("auth", "a b&c");
        assert_eq!(
            token.apply_query("http://pi/admin/api.php?summaryRaw"),
            "http://pi/admin/api.php?summaryRaw&auth=a%20b%26c"
        );
        assert_eq!(SessionToken::empty().apply_query("http://x/"), "http://x/");
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let token = SessionToken::empty()
            .with_header("Cookie", "SID=s3cr3t")
            .with_query("auth", "t0k3n");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("t0k3n"));
        assert!(debug.contains("Cookie"));

        let creds = Credentials::new(Some("admin".to_string())).with_secret("password", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("password"));
        assert_eq!(creds.secret("password"), Some("hunter2"));
    }
}
