//! Raw failures produced by integration adapters.
//!
//! These are the unclassified errors an adapter returns from `login`, `poll`
//! and `command`. They carry enough detail for logs but are never shown to the
//! user directly; see [`super::classify`] for the mapping into [`super::ErrorKind`].

use std::fmt;

use crate::traits::HttpError;

/// Longest upstream body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Integration-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationError {
    /// The HTTP transport failed before a status was received.
    Transport(HttpError),

    /// The upstream answered with a non-success status.
    Status { status: u16, message: String },

    /// The upstream refused the credentials during login.
    LoginRejected { message: String },

    /// The upstream says the established session is no longer valid.
    SessionExpired { message: String },

    /// A stored secret could not be decrypted.
    Decryption { message: String },

    /// The widget configuration or command arguments are unusable.
    Validation { message: String },

    /// The adapter does not implement the requested command.
    UnsupportedCommand { command: String },

    /// The upstream answered, but not in the expected shape.
    InvalidResponse { message: String },

    /// A reachability probe could not reach its target.
    Unreachable { target: String, message: String },
}

impl IntegrationError {
    /// Build a status error, truncating the upstream body.
    pub fn status(status: u16, body: &str) -> Self {
        IntegrationError::Status {
            status,
            message: excerpt(body),
        }
    }

    /// Build an invalid-response error from any displayable cause.
    pub fn invalid_response(cause: impl fmt::Display) -> Self {
        IntegrationError::InvalidResponse {
            message: cause.to_string(),
        }
    }

    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        IntegrationError::Validation {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            IntegrationError::Status { status, .. } => Some(*status),
            IntegrationError::Transport(HttpError::ServerError { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            IntegrationError::Transport(_) => "E_INT_TRANSPORT",
            IntegrationError::Status { .. } => "E_INT_STATUS",
            IntegrationError::LoginRejected { .. } => "E_INT_LOGIN",
            IntegrationError::SessionExpired { .. } => "E_INT_SESSION",
            IntegrationError::Decryption { .. } => "E_INT_DECRYPT",
            IntegrationError::Validation { .. } => "E_INT_VALIDATION",
            IntegrationError::UnsupportedCommand { .. } => "E_INT_COMMAND",
            IntegrationError::InvalidResponse { .. } => "E_INT_INVALID",
            IntegrationError::Unreachable { .. } => "E_INT_UNREACHABLE",
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_EXCERPT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
    format!("{cut}...")
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationError::Transport(err) => write!(f, "{}", err),
            IntegrationError::Status { status, message } => {
                if message.is_empty() {
                    write!(f, "HTTP {}", status)
                } else {
                    write!(f, "HTTP {}: {}", status, message)
                }
            }
            IntegrationError::LoginRejected { message } => {
                write!(f, "Login rejected: {}", message)
            }
            IntegrationError::SessionExpired { message } => {
                write!(f, "Session expired: {}", message)
            }
            IntegrationError::Decryption { message } => {
                write!(f, "Secret decryption failed: {}", message)
            }
            IntegrationError::Validation { message } => {
                write!(f, "Invalid request: {}", message)
            }
            IntegrationError::UnsupportedCommand { command } => {
                write!(f, "Unsupported command '{}'", command)
            }
            IntegrationError::InvalidResponse { message } => {
                write!(f, "Invalid response: {}", message)
            }
            IntegrationError::Unreachable { target, message } => {
                write!(f, "'{}' unreachable: {}", target, message)
            }
        }
    }
}

impl std::error::Error for IntegrationError {}

impl From<HttpError> for IntegrationError {
    fn from(err: HttpError) -> Self {
        IntegrationError::Transport(err)
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(err: serde_json::Error) -> Self {
        IntegrationError::invalid_response(err)
    }
}
