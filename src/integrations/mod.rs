//! Third-party service integrations and the registry that hands them out.
//!
//! Each integration implements [`Integration`] over an injected
//! [`HttpClient`]. Credentialed integrations share one client with full TLS
//! validation; the HTTP probe gets its own relaxed client.

mod deluge;
mod github;
mod kind;
mod overseerr;
mod pihole;
mod probe;
mod qbittorrent;
mod transmission;

pub use deluge::DelugeIntegration;
pub use github::GithubIntegration;
pub use kind::AdapterKind;
pub use overseerr::SeerrIntegration;
pub use pihole::{PiholeV5Integration, PiholeV6Integration};
pub use probe::{HttpProbeIntegration, IcmpProbeIntegration};
pub use qbittorrent::QbittorrentIntegration;
pub use transmission::TransmissionIntegration;

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::ReqwestHttpClient;
use crate::error::IntegrationError;
use crate::traits::{Headers, HttpClient, HttpError, Integration, Response};

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

/// Maps every [`AdapterKind`] to its integration.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<AdapterKind, Arc<dyn Integration>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in integration over reqwest clients.
    pub fn with_defaults(
        http_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, HttpError> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(http_timeout)?);
        let probe: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::insecure(probe_timeout)?);
        Ok(Self::with_clients(http, probe, probe_timeout))
    }

    /// Registry with every built-in integration over the given clients.
    pub fn with_clients(
        http: Arc<dyn HttpClient>,
        probe: Arc<dyn HttpClient>,
        probe_timeout: Duration,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(QbittorrentIntegration::new(http.clone())));
        registry.register(Arc::new(DelugeIntegration::new(http.clone())));
        registry.register(Arc::new(TransmissionIntegration::new(http.clone())));
        registry.register(Arc::new(PiholeV5Integration::new(http.clone())));
        registry.register(Arc::new(PiholeV6Integration::new(http.clone())));
        registry.register(Arc::new(GithubIntegration::new(http.clone())));
        registry.register(Arc::new(SeerrIntegration::new(
            AdapterKind::Jellyseerr,
            http.clone(),
        )));
        registry.register(Arc::new(SeerrIntegration::new(AdapterKind::Overseerr, http)));
        registry.register(Arc::new(HttpProbeIntegration::new(probe)));
        registry.register(Arc::new(IcmpProbeIntegration::new(probe_timeout)));
        registry
    }

    /// Add or replace the integration for its kind.
    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.adapters.insert(integration.kind(), integration);
    }

    pub fn get(&self, kind: AdapterKind) -> Option<Arc<dyn Integration>> {
        self.adapters.get(&kind).cloned()
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<AdapterKind> {
        AdapterKind::ALL
            .into_iter()
            .filter(|kind| self.adapters.contains_key(kind))
            .collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// URL-encode form fields.
pub(crate) fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Fail with a status error unless the response is 2xx.
pub(crate) fn expect_success(response: Response) -> Result<Response, IntegrationError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(IntegrationError::status(
            response.status,
            &response.text_lossy(),
        ))
    }
}

/// Parse a 2xx JSON body.
pub(crate) fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, IntegrationError> {
    let response = expect_success(response)?;
    response.json().map_err(IntegrationError::invalid_response)
}

/// Headers carrying only a content type.
pub(crate) fn content_type(value: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), value.to_string());
    headers
}
