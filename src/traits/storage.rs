//! Configuration storage trait abstraction.
//!
//! The credential store keeps its whole document in memory and writes it back
//! through [`ConfigStorage`] after every effective change.

use async_trait::async_trait;

use crate::store::ConfigDocument;

/// Storage operation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// Failed to read the document
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
    /// Failed to write the document
    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
    /// The stored document is not valid JSON for the expected shape
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Other error
    #[error("Storage error: {0}")]
    Other(String),
}

/// Trait for loading and saving the widget configuration document.
///
/// # Example
///
/// ```ignore
/// use deckhand::traits::ConfigStorage;
///
/// async fn count<S: ConfigStorage>(storage: &S) -> Result<usize, StorageError> {
///     Ok(storage.load().await?.widgets.len())
/// }
/// ```
#[async_trait]
pub trait ConfigStorage: Send + Sync {
    /// Load the document.
    ///
    /// # Returns
    /// - `Ok(document)`; an empty document if nothing was stored yet
    /// - `Err(error)` if the stored data could not be read or parsed
    async fn load(&self) -> Result<ConfigDocument, StorageError>;

    /// Replace the stored document.
    async fn save(&self, document: &ConfigDocument) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        assert_eq!(
            StorageError::LoadFailed("permission denied".to_string()).to_string(),
            "Failed to load configuration: permission denied"
        );
        assert_eq!(
            StorageError::Serialization("expected `{`".to_string()).to_string(),
            "Serialization error: expected `{`"
        );
    }
}
