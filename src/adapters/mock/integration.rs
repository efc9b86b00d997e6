//! Scripted integration for testing the session and scheduling layers.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::IntegrationError;
use crate::integrations::AdapterKind;
use crate::models::{CommandOutcome, CommandRequest, DomainSnapshot, ReachabilitySnapshot};
use crate::traits::{Credentials, Integration, SessionToken, Target};

type Script<T> = Arc<Mutex<VecDeque<Result<T, IntegrationError>>>>;

/// Integration whose results are scripted by the test.
///
/// Each operation pops the next scripted result; with nothing scripted, login
/// returns a fresh `Cookie: SID=token-N` token, poll returns a reachable
/// snapshot, and command succeeds. Calls are counted and the session token
/// used by each poll and command is recorded.
///
/// # Example
///
/// ```ignore
/// let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent)
///     .with_login_delay(Duration::from_millis(50));
/// integration.push_poll(Err(IntegrationError::status(401, "")));
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedIntegration {
    kind: AdapterKind,
    logins: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
    commands: Arc<AtomicUsize>,
    login_script: Script<SessionToken>,
    poll_script: Script<DomainSnapshot>,
    command_script: Script<CommandOutcome>,
    login_delay: Duration,
    poll_delay: Arc<Mutex<Duration>>,
    tokens_seen: Arc<Mutex<Vec<String>>>,
    usernames_seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedIntegration {
    pub fn new(kind: AdapterKind) -> Self {
        Self {
            kind,
            logins: Arc::new(AtomicUsize::new(0)),
            polls: Arc::new(AtomicUsize::new(0)),
            commands: Arc::new(AtomicUsize::new(0)),
            login_script: Arc::default(),
            poll_script: Arc::default(),
            command_script: Arc::default(),
            login_delay: Duration::ZERO,
            poll_delay: Arc::new(Mutex::new(Duration::ZERO)),
            tokens_seen: Arc::default(),
            usernames_seen: Arc::default(),
        }
    }

    /// Make every login take `delay`.
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    /// Make every poll take `delay`.
    pub fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = delay;
    }

    pub fn push_login(&self, result: Result<SessionToken, IntegrationError>) {
        self.login_script.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<DomainSnapshot, IntegrationError>) {
        self.poll_script.lock().unwrap().push_back(result);
    }

    pub fn push_command(&self, result: Result<CommandOutcome, IntegrationError>) {
        self.command_script.lock().unwrap().push_back(result);
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    /// `Cookie` header of the token passed to each poll and command, in order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }

    /// Username passed to each login, in order.
    pub fn usernames_seen(&self) -> Vec<Option<String>> {
        self.usernames_seen.lock().unwrap().clone()
    }

    /// The snapshot returned when no poll result is scripted.
    pub fn default_snapshot(target: &Target) -> DomainSnapshot {
        DomainSnapshot::Reachability(ReachabilitySnapshot {
            target: target.base_url(),
            reachable: true,
            status_code: Some(200),
            latency_ms: Some(1.0),
        })
    }

    fn record_token(&self, token: &SessionToken) {
        let value = token.header("Cookie").unwrap_or_default().to_string();
        self.tokens_seen.lock().unwrap().push(value);
    }
}

#[async_trait]
impl Integration for ScriptedIntegration {
    fn kind(&self) -> AdapterKind {
        self.kind
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &["pause", "resume", "delete"]
    }

    async fn login(
        &self,
        _target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        self.usernames_seen
            .lock()
            .unwrap()
            .push(credentials.username.clone());
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }

        let scripted = self.login_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SessionToken::empty().with_header("Cookie", format!("SID=token-{}", n)))
        })
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        let delay = *self.poll_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.poll_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(Self::default_snapshot(target)))
    }

    async fn command(
        &self,
        _target: &Target,
        token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        self.commands.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);

        let scripted = self.command_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(CommandOutcome::new(request.name.clone(), 1)))
    }
}
