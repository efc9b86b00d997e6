//! Classified error type returned across the command surface.
//!
//! `DeckError` is what the poll scheduler publishes and what every `Hub`
//! operation returns. It always carries an [`ErrorKind`]; the raw upstream
//! detail is kept for logs only.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::classify::classify;
use super::context::ErrorContext;
use super::integration::IntegrationError;
use super::kind::ErrorKind;
use crate::codec::CodecError;
use crate::store::StoreError;

/// Classified error with optional context.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckError {
    kind: ErrorKind,
    detail: String,
    context: Option<ErrorContext>,
}

/// The projection of a [`DeckError`] that is safe to hand to the presentation
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DeckError {
    /// Create a new error of the given kind.
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            context: None,
        }
    }

    /// Classify a raw integration failure with the default mapping.
    pub fn from_integration(err: &IntegrationError) -> Self {
        Self::classified(classify(err), err)
    }

    /// Wrap a raw integration failure that was already classified by its adapter.
    pub fn classified(kind: ErrorKind, err: &IntegrationError) -> Self {
        Self::new(kind, err.to_string())
    }

    /// Shorthand for a validation failure.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, detail)
    }

    /// Error for an unknown widget id.
    pub fn widget_not_found(widget_id: &str) -> Self {
        Self::validation(format!("widget '{}' not found", widget_id))
    }

    /// The classified kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Internal detail, suitable for logs.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Short, classified message for the user.
    pub fn user_message(&self) -> String {
        match self.kind {
            // Validation details are produced locally, never copied from upstream.
            ErrorKind::ValidationError if !self.detail.is_empty() => {
                format!("{} ({})", self.kind.user_message(), self.detail)
            }
            _ => self.kind.user_message().to_string(),
        }
    }

    /// Attach context to this error.
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Get the context if this error has one attached.
    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    /// Returns true if the error requires a configuration change.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// The projection handed to the presentation layer.
    pub fn to_public(&self) -> PublicError {
        PublicError {
            kind: self.kind,
            message: self.user_message(),
        }
    }
}

impl fmt::Display for DeckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}: {} ({})", self.kind, self.detail, ctx),
            None => write!(f, "{}: {}", self.kind, self.detail),
        }
    }
}

impl std::error::Error for DeckError {}

impl From<IntegrationError> for DeckError {
    fn from(err: IntegrationError) -> Self {
        DeckError::from_integration(&err)
    }
}

impl From<CodecError> for DeckError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decryption(_) | CodecError::Key(_) => {
                DeckError::new(ErrorKind::DecryptionError, err.to_string())
            }
            CodecError::Encoding(_) => DeckError::validation(err.to_string()),
        }
    }
}

impl From<StoreError> for DeckError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DeckError::widget_not_found(&id),
            StoreError::AlreadyExists(_) | StoreError::Invalid(_) => {
                DeckError::validation(err.to_string())
            }
            StoreError::Codec(codec) => codec.into(),
            StoreError::Storage(_) => DeckError::new(ErrorKind::UnknownError, err.to_string()),
        }
    }
}
