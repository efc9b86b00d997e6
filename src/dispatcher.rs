//! User-triggered commands.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{DeckError, DeckResult};
use crate::models::{CommandOutcome, CommandRequest};
use crate::scheduler::PollScheduler;
use crate::session::SessionManager;

/// Runs commands through the session layer and refreshes the widget after.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    sessions: Arc<SessionManager>,
    scheduler: Arc<PollScheduler>,
}

impl CommandDispatcher {
    pub fn new(sessions: Arc<SessionManager>, scheduler: Arc<PollScheduler>) -> Self {
        Self {
            sessions,
            scheduler,
        }
    }

    /// Command names the widget's integration accepts.
    pub async fn supported_commands(&self, widget_id: &str) -> DeckResult<&'static [&'static str]> {
        let config = self.sessions.store().config(widget_id).await?;
        let integration = self.sessions.registry().get(config.kind).ok_or_else(|| {
            DeckError::validation(format!("no integration registered for {}", config.kind))
        })?;
        Ok(integration.supported_commands())
    }

    /// Run `name` with `args` against the widget's service.
    ///
    /// Unknown commands are rejected before any login happens. On success,
    /// every subscription of the widget is refreshed.
    pub async fn execute(
        &self,
        widget_id: &str,
        name: &str,
        args: Map<String, Value>,
    ) -> DeckResult<CommandOutcome> {
        let supported = self.supported_commands(widget_id).await?;
        if !supported.contains(&name) {
            return Err(DeckError::validation(format!(
                "unsupported command '{}' (supported: {})",
                name,
                supported.join(", ")
            )));
        }

        let request = CommandRequest {
            name: name.to_string(),
            args,
        };
        let outcome = self.sessions.command(widget_id, &request).await?;
        tracing::info!(
            widget_id = %widget_id,
            command = %name,
            affected = outcome.affected,
            "Command completed"
        );
        self.scheduler.refresh(widget_id);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryConfigStorage, ScriptedIntegration};
    use crate::codec::{SecretCodec, SecretKey};
    use crate::error::{ErrorKind, IntegrationError};
    use crate::integrations::{AdapterKind, AdapterRegistry};
    use crate::store::{CredentialStore, WidgetConfig};
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn dispatcher_with(integration: &ScriptedIntegration) -> (CommandDispatcher, Arc<PollScheduler>) {
        let codec = SecretCodec::new(&SecretKey::generate());
        let store = Arc::new(
            CredentialStore::open(Arc::new(InMemoryConfigStorage::new()), codec)
                .await
                .unwrap(),
        );
        store
            .create(WidgetConfig::new("dl", AdapterKind::Deluge, "nas.local").with_port(8112))
            .await
            .unwrap();
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(integration.clone()));
        let sessions = Arc::new(SessionManager::new(store, registry, Duration::from_secs(1)));
        let scheduler = Arc::new(PollScheduler::new(sessions.clone()));
        (CommandDispatcher::new(sessions, scheduler.clone()), scheduler)
    }

    #[tokio::test]
    async fn test_unknown_command_skips_login() {
        let integration = ScriptedIntegration::new(AdapterKind::Deluge);
        let (dispatcher, _) = dispatcher_with(&integration).await;

        let err = dispatcher.execute("dl", "reboot", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(integration.login_count(), 0);
    }

    #[tokio::test]
    async fn test_success_refreshes_subscriptions() {
        let integration = ScriptedIntegration::new(AdapterKind::Deluge);
        let (dispatcher, scheduler) = dispatcher_with(&integration).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        scheduler
            .subscribe("dl", Duration::from_secs(3600), tx)
            .unwrap();
        rx.recv().await.unwrap();

        let mut args = Map::new();
        args.insert("ids".to_string(), Value::from("abc"));
        let outcome = dispatcher.execute("dl", "pause", args).await.unwrap();
        assert_eq!(outcome.command, "pause");

        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(integration.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_refresh() {
        let integration = ScriptedIntegration::new(AdapterKind::Deluge);
        integration.push_command(Err(IntegrationError::status(404, "no such torrent")));
        let (dispatcher, _) = dispatcher_with(&integration).await;

        let err = dispatcher.execute("dl", "delete", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(integration.command_count(), 1);
    }
}
