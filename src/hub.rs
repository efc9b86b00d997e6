//! The command surface handed to the presentation layer.
//!
//! Everything a dashboard can do goes through [`Hub`]. Nothing it returns
//! carries plaintext or stored ciphertext: widget configuration comes back as
//! [`PublicWidgetConfig`] and failures as classified [`DeckError`]s.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::adapters::FileConfigStorage;
use crate::codec::SecretCodec;
use crate::config::DeckConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::{DeckError, DeckResult, ErrorContext, ErrorKind, ResultExt};
use crate::integrations::AdapterRegistry;
use crate::models::{CommandOutcome, DomainSnapshot};
use crate::scheduler::{PollEvent, PollScheduler, SubscriptionHandle};
use crate::session::{SessionKey, SessionManager, SessionState};
use crate::store::{CredentialStore, FieldUpdate, PublicWidgetConfig, SettingsUpdate, WidgetConfig};
use crate::traits::ConfigStorage;

pub struct Hub {
    store: Arc<CredentialStore>,
    sessions: Arc<SessionManager>,
    scheduler: Arc<PollScheduler>,
    dispatcher: CommandDispatcher,
}

impl Hub {
    /// Open the hub described by `config`: file storage, key file and reqwest clients.
    pub async fn open(config: &DeckConfig) -> DeckResult<Self> {
        let path = config.resolved_config_path().ok_or_else(|| {
            DeckError::validation("no home directory; set DECKHAND_CONFIG to the widgets file")
        })?;
        let codec = SecretCodec::new(&config.load_key()?);
        let registry = AdapterRegistry::with_defaults(config.http_timeout, config.probe_timeout)
            .map_err(|err| DeckError::new(ErrorKind::UnknownError, err.to_string()))?;
        tracing::info!(path = %path.display(), "Opening widget store");

        Self::with_parts(
            Arc::new(FileConfigStorage::at(path)),
            codec,
            registry,
            config.operation_timeout(),
        )
        .await
    }

    /// Assemble a hub from explicit parts.
    pub async fn with_parts(
        storage: Arc<dyn ConfigStorage>,
        codec: SecretCodec,
        registry: AdapterRegistry,
        operation_timeout: Duration,
    ) -> DeckResult<Self> {
        let store = Arc::new(CredentialStore::open(storage, codec).await?);
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            registry,
            operation_timeout,
        ));
        let scheduler = Arc::new(PollScheduler::new(sessions.clone()));
        let dispatcher = CommandDispatcher::new(sessions.clone(), scheduler.clone());
        Ok(Self {
            store,
            sessions,
            scheduler,
            dispatcher,
        })
    }

    /// Log in (or reuse the current session) for the widget.
    pub async fn login(&self, widget_id: &str) -> DeckResult<SessionState> {
        self.sessions.ensure_session(widget_id).await?;
        Ok(SessionState::Authenticated)
    }

    /// Poll the widget once.
    pub async fn poll(&self, widget_id: &str) -> DeckResult<DomainSnapshot> {
        self.sessions.poll(widget_id).await
    }

    /// Run a widget command, e.g. `pause` with `{"ids": ["abc"]}`.
    pub async fn command(
        &self,
        widget_id: &str,
        name: &str,
        args: Map<String, Value>,
    ) -> DeckResult<CommandOutcome> {
        self.dispatcher.execute(widget_id, name, args).await
    }

    /// Commands the widget accepts.
    pub async fn supported_commands(&self, widget_id: &str) -> DeckResult<&'static [&'static str]> {
        self.dispatcher.supported_commands(widget_id).await
    }

    /// Submit a secret field.
    ///
    /// The sentinel leaves the stored value alone; any effective change drops
    /// the widget's session so the next call logs in with the new value.
    pub async fn set_secret(
        &self,
        widget_id: &str,
        field: &str,
        value: &str,
    ) -> DeckResult<FieldUpdate> {
        let update = self
            .store
            .set_field(widget_id, field, value)
            .await
            .context(ErrorContext::new("set_secret").with_widget_id(widget_id))?;
        if update.is_change() {
            self.sessions.invalidate(widget_id).await;
        }
        Ok(update)
    }

    /// Configuration with secrets masked.
    pub async fn get_public_config(&self, widget_id: &str) -> DeckResult<PublicWidgetConfig> {
        Ok(self.store.public_config(widget_id).await?)
    }

    /// Every widget, masked.
    pub async fn list_widgets(&self) -> Vec<PublicWidgetConfig> {
        self.store.public_configs().await
    }

    pub async fn create_widget(&self, config: WidgetConfig) -> DeckResult<PublicWidgetConfig> {
        let widget_id = config.id.clone();
        self.store
            .create(config)
            .await
            .context(ErrorContext::new("create_widget").with_widget_id(widget_id))
    }

    /// Apply non-secret edits and return the updated public view.
    pub async fn update_widget(
        &self,
        widget_id: &str,
        update: SettingsUpdate,
    ) -> DeckResult<PublicWidgetConfig> {
        let changed = self
            .store
            .update_settings(widget_id, update)
            .await
            .context(ErrorContext::new("update_widget").with_widget_id(widget_id))?;
        if changed {
            self.sessions.invalidate(widget_id).await;
        }
        self.get_public_config(widget_id).await
    }

    /// Remove the widget along with its subscriptions and session.
    pub async fn delete_widget(&self, widget_id: &str) -> DeckResult<()> {
        self.store
            .remove(widget_id)
            .await
            .context(ErrorContext::new("delete_widget").with_widget_id(widget_id))?;
        let cancelled = self.scheduler.unsubscribe_widget(widget_id);
        self.sessions.remove(widget_id);
        tracing::debug!(widget_id = %widget_id, cancelled, "Widget deleted");
        Ok(())
    }

    /// Poll the widget every `interval`, delivering events to `sink`.
    pub async fn subscribe(
        &self,
        widget_id: &str,
        interval: Duration,
        sink: mpsc::UnboundedSender<PollEvent>,
    ) -> DeckResult<SubscriptionHandle> {
        self.store.config(widget_id).await?;
        self.scheduler.subscribe(widget_id, interval, sink)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.scheduler.unsubscribe(handle)
    }

    /// Session state of the widget.
    pub async fn session_state(&self, widget_id: &str) -> DeckResult<SessionState> {
        let config = self.store.config(widget_id).await?;
        Ok(self.sessions.state(&SessionKey::new(widget_id, config.kind)))
    }

    /// Stop every subscription.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("sessions", &self.sessions)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
