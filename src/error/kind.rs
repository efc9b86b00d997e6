//! Classified error taxonomy shared by every integration.
//!
//! Adapters map their raw failures into one of these kinds; the scheduler,
//! dispatcher and session manager only ever branch on the kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of failure kinds surfaced by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A stored secret could not be decrypted (wrong key, corrupted record).
    DecryptionError,

    /// The session was valid once but the upstream no longer accepts it.
    AuthExpired,

    /// The upstream rejected the credentials on login.
    AuthInvalid,

    /// The upstream throttled or forbade the request.
    RateLimited,

    /// Timeout, DNS failure, refused connection or unreachable gateway.
    ConnectionError,

    /// Malformed request, unknown widget, unsupported command or bad config.
    ValidationError,

    /// Anything the adapter could not place in another kind.
    UnknownError,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::DecryptionError,
        ErrorKind::AuthExpired,
        ErrorKind::AuthInvalid,
        ErrorKind::RateLimited,
        ErrorKind::ConnectionError,
        ErrorKind::ValidationError,
        ErrorKind::UnknownError,
    ];

    /// Returns true if the failure can only be fixed by editing the widget's
    /// configuration. Automatic polling stops until that happens.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrorKind::DecryptionError | ErrorKind::AuthInvalid)
    }

    /// Returns true if the next natural poll tick may succeed without any
    /// user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::ConnectionError | ErrorKind::UnknownError
        )
    }

    /// Returns a short label suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DecryptionError => "decryption_error",
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::AuthInvalid => "auth_invalid",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::UnknownError => "unknown_error",
        }
    }

    /// Short message shown to the user in place of the raw upstream failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::DecryptionError => {
                "Stored credentials could not be decrypted. Re-enter them in the widget settings."
            }
            ErrorKind::AuthExpired => "The session expired and could not be renewed.",
            ErrorKind::AuthInvalid => "The service rejected the configured credentials.",
            ErrorKind::RateLimited => "The service is throttling requests. Retrying shortly.",
            ErrorKind::ConnectionError => "The service could not be reached.",
            ErrorKind::ValidationError => "The request or widget configuration is invalid.",
            ErrorKind::UnknownError => "The service returned an unexpected error.",
        }
    }

    /// Returns suggested recovery action for this kind.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorKind::DecryptionError | ErrorKind::AuthInvalid => {
                "Update the credentials in the widget settings"
            }
            ErrorKind::AuthExpired => "Try again; the dashboard will log in again",
            ErrorKind::RateLimited => "Wait for the next refresh",
            ErrorKind::ConnectionError => "Check that the service is running and reachable",
            ErrorKind::ValidationError => "Check the widget configuration",
            ErrorKind::UnknownError => "Check the service logs",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
