//! Per-widget session state.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DeckError, ErrorKind};
use crate::integrations::AdapterKind;
use crate::traits::SessionToken;

/// Refresh a session this long before its upstream validity runs out.
const EXPIRY_BUFFER_SECS: i64 = 30;

/// Identifies one session: a widget talking to one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub widget_id: String,
    pub adapter: AdapterKind,
}

impl SessionKey {
    pub fn new(widget_id: impl Into<String>, adapter: AdapterKind) -> Self {
        Self {
            widget_id: widget_id.into(),
            adapter,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.widget_id, self.adapter)
    }
}

/// Where a session is in its lifecycle.
///
/// ```text
/// Unauthenticated -> Authenticating -> Authenticated -> Expired -> Authenticating
///                                   \-> Failed -> Authenticating (transient)
///                                            \-> Unauthenticated (credentials edited)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Expired,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Expired => "expired",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Session material and bookkeeping for one [`SessionKey`].
#[derive(Debug, Clone)]
pub struct Session {
    pub state: SessionState,
    pub token: Option<SessionToken>,
    pub established_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Error from the last failed login.
    pub last_error: Option<DeckError>,
    /// Consecutive failed logins.
    pub failures: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            token: None,
            established_at: None,
            expires_at: None,
            last_error: None,
            failures: 0,
        }
    }

    /// The token, if the session is authenticated and not about to expire.
    pub fn usable_token(&self, now: DateTime<Utc>) -> Option<&SessionToken> {
        if self.state != SessionState::Authenticated {
            return None;
        }
        match self.expires_at {
            Some(expires_at) if now + ChronoDuration::seconds(EXPIRY_BUFFER_SECS) >= expires_at => {
                None
            }
            _ => self.token.as_ref(),
        }
    }

    /// Kind of the last login failure, if the session is failed.
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self.state {
            SessionState::Failed => self.last_error.as_ref().map(DeckError::kind),
            _ => None,
        }
    }

    /// Failed with an error no retry can fix.
    pub fn is_blocked(&self) -> bool {
        self.failure_kind().is_some_and(|kind| kind.is_terminal())
    }

    pub(crate) fn establish(&mut self, token: SessionToken, now: DateTime<Utc>) {
        self.expires_at = token
            .ttl()
            .and_then(|ttl| ChronoDuration::from_std(ttl).ok())
            .map(|ttl| now + ttl);
        self.established_at = Some(now);
        self.token = Some(token);
        self.state = SessionState::Authenticated;
        self.last_error = None;
        self.failures = 0;
    }

    pub(crate) fn fail(&mut self, error: DeckError) {
        self.state = SessionState::Failed;
        self.token = None;
        self.expires_at = None;
        self.last_error = Some(error);
        self.failures += 1;
    }

    /// Mark the session expired if it still holds `used`.
    ///
    /// Returns false when another caller already replaced the token.
    pub(crate) fn expire(&mut self, used: &SessionToken) -> bool {
        if self.state == SessionState::Authenticated && self.token.as_ref() == Some(used) {
            self.state = SessionState::Expired;
            self.token = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_usable_token_respects_expiry() {
        let now = Utc::now();
        let mut session = Session::new();
        assert!(session.usable_token(now).is_none());

        session.establish(
            SessionToken::empty()
                .with_header("X-FTL-SID", "abc")
                .with_ttl(Duration::from_secs(300)),
            now,
        );
        assert!(session.usable_token(now).is_some());
        assert!(session
            .usable_token(now + ChronoDuration::seconds(280))
            .is_none());
    }

    #[test]
    fn test_expire_only_replaces_matching_token() {
        let now = Utc::now();
        let old = SessionToken::empty().with_header("Cookie", "SID=old");
        let new = SessionToken::empty().with_header("Cookie", "SID=new");

        let mut session = Session::new();
        session.establish(new.clone(), now);
        assert!(!session.expire(&old));
        assert_eq!(session.state, SessionState::Authenticated);
        assert!(session.expire(&new));
        assert_eq!(session.state, SessionState::Expired);
    }

    #[test]
    fn test_terminal_failure_blocks() {
        let mut session = Session::new();
        session.fail(DeckError::new(ErrorKind::ConnectionError, "timeout"));
        assert!(!session.is_blocked());
        session.fail(DeckError::new(ErrorKind::AuthInvalid, "rejected"));
        assert!(session.is_blocked());
        assert_eq!(session.failures, 2);

        session.reset();
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(!session.is_blocked());
    }
}
