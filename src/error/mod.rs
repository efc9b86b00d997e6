//! Error classification for the session layer.
//!
//! This module provides:
//!
//! - **Error Kinds**: the closed taxonomy every caller branches on
//! - **Integration Errors**: raw adapter failures, never shown to users
//! - **Classifier**: the default raw-to-kind mapping adapters build on
//! - **Classified Error**: `DeckError`, carrying kind, detail and context
//! - **Result Type Alias**: `DeckResult<T>` for consistent return types
//!
//! # Kinds
//!
//! | Kind | Typical cause | Automatic handling |
//! |------|---------------|--------------------|
//! | DecryptionError | stored secret unreadable | polling suspended |
//! | AuthExpired | 401, expired SID | one re-login, then surfaced |
//! | AuthInvalid | login rejected | polling suspended |
//! | RateLimited | 403, 429 | retried on next tick |
//! | ConnectionError | timeout, refused, DNS | retried on next tick |
//! | ValidationError | bad config or command | surfaced |
//! | UnknownError | anything else | retried on next tick |

mod classify;
mod context;
mod deck_error;
mod integration;
mod kind;
mod result;

pub use classify::{classify, classify_status, classify_transport};
pub use context::ErrorContext;
pub use deck_error::{DeckError, PublicError};
pub use integration::IntegrationError;
pub use kind::ErrorKind;
pub use result::{DeckResult, ResultExt};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::traits::HttpError;

    /// Every raw failure lands in exactly one kind from the taxonomy.
    #[test]
    fn test_classification_is_closed() {
        let raw = vec![
            IntegrationError::Transport(HttpError::ConnectionFailed("refused".to_string())),
            IntegrationError::Transport(HttpError::Other("boom".to_string())),
            IntegrationError::status(401, ""),
            IntegrationError::status(418, ""),
            IntegrationError::LoginRejected {
                message: "nope".to_string(),
            },
            IntegrationError::invalid_response("not json"),
        ];

        for err in raw {
            let kind = classify(&err);
            assert!(ErrorKind::ALL.contains(&kind));
            let deck = DeckError::classified(kind, &err);
            assert!(!deck.user_message().is_empty());
        }
    }
}
