//! Per-widget configuration records with encrypted secret fields.
//!
//! The store is the only component that ever sees submitted plaintext. What
//! leaves it upward is either a [`PublicWidgetConfig`] (sentinel plus
//! `_has*` flags) or, crate-internally, decrypted [`crate::traits::Credentials`]
//! for a login.

mod credential_store;
mod widget;

pub use credential_store::CredentialStore;
pub use widget::{
    flag_name, ConfigDocument, FieldUpdate, PublicWidgetConfig, SettingsUpdate, WidgetConfig,
    WidgetCredential,
};

use crate::codec::CodecError;
use crate::traits::StorageError;

/// Store failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("widget '{0}' not found")]
    NotFound(String),

    #[error("widget '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid widget configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
