//! Common fixtures for deckhand integration tests.
//!
//! # Example
//!
//! ```ignore
//! let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent);
//! let (hub, storage) = scripted_hub(&integration).await;
//! hub.set_secret(WIDGET, "password", "hunter2").await.unwrap();
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use deckhand::adapters::{InMemoryConfigStorage, ReqwestHttpClient, ScriptedIntegration};
use deckhand::codec::{SecretCodec, SecretKey};
use deckhand::hub::Hub;
use deckhand::integrations::{AdapterKind, AdapterRegistry};
use deckhand::store::WidgetConfig;
use deckhand::traits::{ConfigStorage, HttpClient, Integration};

/// Widget id used by the scripted fixtures.
pub const WIDGET: &str = "downloads";

/// Key material shared by tests that reopen a store.
pub const KEY_MATERIAL: &str = "integration-test-key";

pub fn test_codec() -> SecretCodec {
    SecretCodec::from_material(KEY_MATERIAL).expect("key material is valid")
}

/// Hub over in-memory storage whose only integration is `integration`.
///
/// Registers [`WIDGET`] as a widget of the integration's kind with username
/// `admin`.
pub async fn scripted_hub(integration: &ScriptedIntegration) -> (Hub, Arc<InMemoryConfigStorage>) {
    scripted_hub_with_timeout(integration, Duration::from_secs(2)).await
}

pub async fn scripted_hub_with_timeout(
    integration: &ScriptedIntegration,
    timeout: Duration,
) -> (Hub, Arc<InMemoryConfigStorage>) {
    let storage = Arc::new(InMemoryConfigStorage::new());
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(integration.clone()));

    let hub = Hub::with_parts(storage.clone(), test_codec(), registry, timeout)
        .await
        .expect("hub opens");
    hub.create_widget(WidgetConfig::new(WIDGET, integration.kind(), "nas.local").with_username("admin"))
        .await
        .expect("widget created");
    (hub, storage)
}

/// Every built-in integration over real reqwest clients.
pub fn reqwest_registry() -> AdapterRegistry {
    let http: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::with_timeout(Duration::from_secs(5)).expect("client builds"),
    );
    let probe: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::insecure(Duration::from_secs(5)).expect("client builds"));
    AdapterRegistry::with_clients(http, probe, Duration::from_secs(5))
}

/// Hub over `storage` with the built-in integrations.
pub async fn reqwest_hub(storage: Arc<dyn ConfigStorage>) -> Hub {
    Hub::with_parts(storage, test_codec(), reqwest_registry(), Duration::from_secs(10))
        .await
        .expect("hub opens")
}

/// Hub over fresh in-memory storage holding `widget`.
pub async fn reqwest_hub_for(widget: WidgetConfig) -> Hub {
    let hub = reqwest_hub(Arc::new(InMemoryConfigStorage::new())).await;
    hub.create_widget(widget).await.expect("widget created");
    hub
}

/// A widget of `kind` whose host is the mock server's base URI.
pub fn widget_at(id: &str, kind: AdapterKind, uri: &str) -> WidgetConfig {
    WidgetConfig::new(id, kind, uri)
}

/// A random key, never the one behind [`KEY_MATERIAL`].
pub fn other_codec() -> SecretCodec {
    SecretCodec::new(&SecretKey::generate())
}
