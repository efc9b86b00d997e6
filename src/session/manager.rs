//! Session lifecycle: single-flight login, bounded calls, one re-login on expiry.

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::state::{Session, SessionKey, SessionState};
use crate::error::{DeckError, DeckResult, ErrorContext, ErrorKind, IntegrationError};
use crate::integrations::AdapterRegistry;
use crate::models::{CommandOutcome, CommandRequest, DomainSnapshot};
use crate::store::CredentialStore;
use crate::traits::{HttpError, Integration, SessionToken, Target};

/// One session plus the generation counter that lets waiters share a login outcome.
#[derive(Debug)]
struct Slot {
    session: tokio::sync::Mutex<Session>,
    /// Bumped every time a login attempt completes.
    generation: AtomicU64,
    /// Readable while a login holds `session`.
    state: Mutex<SessionState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            session: tokio::sync::Mutex::new(Session::new()),
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState::Unauthenticated),
        }
    }

    fn publish(&self, state: SessionState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(SessionState::Unauthenticated)
    }
}

/// A login in flight. Holds the slot lock and puts the previous state back
/// if the caller is dropped before the login completes.
struct LoginAttempt<'a> {
    session: tokio::sync::MutexGuard<'a, Session>,
    slot: &'a Slot,
    previous: SessionState,
    completed: bool,
}

impl<'a> LoginAttempt<'a> {
    fn begin(mut session: tokio::sync::MutexGuard<'a, Session>, slot: &'a Slot) -> Self {
        let previous = session.state;
        session.state = SessionState::Authenticating;
        slot.publish(SessionState::Authenticating);
        Self {
            session,
            slot,
            previous,
            completed: false,
        }
    }

    fn failures(&self) -> u32 {
        self.session.failures
    }

    fn succeed(&mut self, token: SessionToken) {
        self.session.establish(token, Utc::now());
        self.slot.publish(SessionState::Authenticated);
        self.completed = true;
    }

    fn fail(&mut self, error: DeckError) {
        self.session.fail(error);
        self.slot.publish(SessionState::Failed);
        self.completed = true;
    }
}

impl Drop for LoginAttempt<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.session.state = self.previous;
            self.slot.publish(self.previous);
            tracing::debug!(state = %self.previous, "Login abandoned");
        }
    }
}

/// Everything needed to talk to one widget's service.
struct Resolved {
    key: SessionKey,
    target: Target,
    integration: Arc<dyn Integration>,
}

/// Owns every widget session.
///
/// Concurrent callers for the same key share one login: the first caller logs
/// in while holding the slot lock, later callers wait on the lock and reuse the
/// token or the failure it produced.
pub struct SessionManager {
    store: Arc<CredentialStore>,
    registry: AdapterRegistry,
    timeout: Duration,
    slots: Mutex<HashMap<SessionKey, Arc<Slot>>>,
}

impl SessionManager {
    pub fn new(store: Arc<CredentialStore>, registry: AdapterRegistry, timeout: Duration) -> Self {
        Self {
            store,
            registry,
            timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Current state for `key`; unknown keys are unauthenticated.
    pub fn state(&self, key: &SessionKey) -> SessionState {
        self.existing_slot(key)
            .map(|slot| slot.state())
            .unwrap_or(SessionState::Unauthenticated)
    }

    /// Return a valid token, logging in at most once across concurrent callers.
    pub async fn ensure_session(&self, widget_id: &str) -> DeckResult<SessionToken> {
        let resolved = self.resolve(widget_id).await?;
        self.ensure(&resolved).await
    }

    /// Read the widget's snapshot.
    pub async fn poll(&self, widget_id: &str) -> DeckResult<DomainSnapshot> {
        self.authorized(widget_id, "poll", |integration, target, token| async move {
            integration.poll(&target, &token).await
        })
        .await
    }

    /// Run a command against the widget's service.
    pub async fn command(
        &self,
        widget_id: &str,
        request: &CommandRequest,
    ) -> DeckResult<CommandOutcome> {
        let operation = format!("command:{}", request.name);
        self.authorized(widget_id, &operation, |integration, target, token| {
            let request = request.clone();
            async move { integration.command(&target, &token, &request).await }
        })
        .await
    }

    /// Expire the session for `key` so the next call logs in again.
    pub async fn mark_expired(&self, key: &SessionKey) {
        if let Some(slot) = self.existing_slot(key) {
            let mut session = slot.session.lock().await;
            if let Some(token) = session.token.clone() {
                if session.expire(&token) {
                    slot.publish(SessionState::Expired);
                    tracing::info!(widget_id = %key.widget_id, adapter = %key.adapter, "Session marked expired");
                }
            }
        }
    }

    /// Forget every session of the widget, e.g. after its credentials changed.
    pub async fn invalidate(&self, widget_id: &str) {
        for slot in self.slots_for(widget_id) {
            let mut session = slot.session.lock().await;
            session.reset();
            slot.publish(SessionState::Unauthenticated);
        }
        tracing::debug!(widget_id = %widget_id, "Sessions invalidated");
    }

    /// Reset failed sessions of the widget so the next call logs in again.
    ///
    /// Live sessions are kept.
    pub async fn clear_failures(&self, widget_id: &str) {
        for slot in self.slots_for(widget_id) {
            let mut session = slot.session.lock().await;
            if session.state == SessionState::Failed {
                session.reset();
                slot.publish(SessionState::Unauthenticated);
                tracing::debug!(widget_id = %widget_id, "Cleared failed session");
            }
        }
    }

    /// Drop every session of a deleted widget.
    pub fn remove(&self, widget_id: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.retain(|key, _| key.widget_id != widget_id);
        }
    }

    async fn resolve(&self, widget_id: &str) -> DeckResult<Resolved> {
        let config = self.store.config(widget_id).await?;
        let integration = self.registry.get(config.kind).ok_or_else(|| {
            DeckError::validation(format!("no integration registered for {}", config.kind))
        })?;
        Ok(Resolved {
            key: SessionKey::new(widget_id, config.kind),
            target: config.target(),
            integration,
        })
    }

    fn slot(&self, key: &SessionKey) -> Arc<Slot> {
        match self.slots.lock() {
            Ok(mut slots) => slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Slot::new()))
                .clone(),
            // A poisoned map still hands out a working, if unshared, slot.
            Err(_) => Arc::new(Slot::new()),
        }
    }

    fn existing_slot(&self, key: &SessionKey) -> Option<Arc<Slot>> {
        self.slots.lock().ok()?.get(key).cloned()
    }

    fn slots_for(&self, widget_id: &str) -> Vec<Arc<Slot>> {
        self.slots
            .lock()
            .map(|slots| {
                slots
                    .iter()
                    .filter(|(key, _)| key.widget_id == widget_id)
                    .map(|(_, slot)| slot.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn context(key: &SessionKey, operation: &str) -> ErrorContext {
        ErrorContext::new(operation)
            .with_widget_id(key.widget_id.clone())
            .with_adapter(key.adapter.as_str())
    }

    /// Run `future` under the manager's timeout.
    async fn bounded<T>(
        &self,
        future: impl Future<Output = Result<T, IntegrationError>>,
    ) -> Result<T, IntegrationError> {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(IntegrationError::Transport(HttpError::Timeout(format!(
                "no response within {:?}",
                self.timeout
            )))),
        }
    }

    async fn ensure(&self, resolved: &Resolved) -> DeckResult<SessionToken> {
        let key = &resolved.key;
        let slot = self.slot(key);
        let seen = slot.generation.load(Ordering::SeqCst);
        let session = slot.session.lock().await;

        if let Some(token) = session.usable_token(Utc::now()) {
            return Ok(token.clone());
        }

        // A login finished while we waited for the lock: share its failure.
        if slot.generation.load(Ordering::SeqCst) != seen && session.state == SessionState::Failed
        {
            if let Some(error) = session.last_error.clone() {
                return Err(error);
            }
        }

        if session.is_blocked() {
            if let Some(error) = session.last_error.clone() {
                tracing::debug!(widget_id = %key.widget_id, adapter = %key.adapter, "Login suppressed until credentials change");
                return Err(error);
            }
        }

        let mut attempt = LoginAttempt::begin(session, &slot);
        tracing::debug!(widget_id = %key.widget_id, adapter = %key.adapter, "Logging in");

        let outcome = self.login(resolved).await;
        slot.generation.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(token) => {
                attempt.succeed(token.clone());
                tracing::info!(widget_id = %key.widget_id, adapter = %key.adapter, "Session established");
                Ok(token)
            }
            Err(error) => {
                tracing::warn!(
                    widget_id = %key.widget_id,
                    adapter = %key.adapter,
                    kind = %error.kind(),
                    failures = attempt.failures() + 1,
                    "Login failed: {}",
                    error.detail()
                );
                attempt.fail(error.clone());
                Err(error)
            }
        }
    }

    async fn login(&self, resolved: &Resolved) -> DeckResult<SessionToken> {
        let key = &resolved.key;
        let context = Self::context(key, "login");
        let credentials = self
            .store
            .credentials(&key.widget_id)
            .await
            .map_err(|err| DeckError::from(err).with_context(context.clone()))?;

        self.bounded(resolved.integration.login(&resolved.target, &credentials))
            .await
            .map_err(|err| {
                DeckError::classified(resolved.integration.classify(&err), &err)
                    .with_context(context)
            })
    }

    /// Run an operation with a session, re-logging in once if it reports expiry.
    async fn authorized<T, F, Fut>(&self, widget_id: &str, operation: &str, call: F) -> DeckResult<T>
    where
        F: Fn(Arc<dyn Integration>, Target, SessionToken) -> Fut,
        Fut: Future<Output = Result<T, IntegrationError>>,
    {
        let resolved = self.resolve(widget_id).await?;
        let key = &resolved.key;
        let mut attempt = 1;

        loop {
            let token = self.ensure(&resolved).await?;
            let result = self
                .bounded(call(
                    resolved.integration.clone(),
                    resolved.target.clone(),
                    token.clone(),
                ))
                .await;

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let kind = resolved.integration.classify(&err);
            let error = DeckError::classified(kind, &err)
                .with_context(Self::context(key, operation).with_attempt(attempt));

            if kind == ErrorKind::AuthExpired {
                self.expire_token(key, &token).await;
                if attempt == 1 {
                    tracing::info!(widget_id = %key.widget_id, adapter = %key.adapter, operation, "Session expired, logging in again");
                    attempt += 1;
                    continue;
                }
            }

            tracing::warn!(
                widget_id = %key.widget_id,
                adapter = %key.adapter,
                operation,
                kind = %kind,
                "Operation failed: {}",
                error.detail()
            );
            return Err(error);
        }
    }

    async fn expire_token(&self, key: &SessionKey, used: &SessionToken) {
        if let Some(slot) = self.existing_slot(key) {
            let mut session = slot.session.lock().await;
            if session.expire(used) {
                slot.publish(SessionState::Expired);
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish()
    }
}
