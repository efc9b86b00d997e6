//! In-memory configuration storage for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::store::ConfigDocument;
use crate::traits::{ConfigStorage, StorageError};

/// In-memory configuration storage for testing.
///
/// Keeps the last saved document, counts saves, and can be told to fail.
///
/// # Example
///
/// ```ignore
/// use deckhand::adapters::mock::InMemoryConfigStorage;
///
/// let storage = Arc::new(InMemoryConfigStorage::new());
/// let store = CredentialStore::open(storage.clone(), codec).await?;
/// store.create(config).await?;
/// assert_eq!(storage.save_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigStorage {
    document: Arc<Mutex<ConfigDocument>>,
    saves: Arc<Mutex<usize>>,
    save_should_fail: Arc<Mutex<bool>>,
    load_should_fail: Arc<Mutex<bool>>,
}

impl InMemoryConfigStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a document.
    pub fn with_document(document: ConfigDocument) -> Self {
        let storage = Self::new();
        *storage.document.lock().unwrap() = document;
        storage
    }

    /// The last saved (or initial) document.
    pub fn document(&self) -> ConfigDocument {
        self.document.lock().unwrap().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    /// Configure whether save should fail.
    pub fn fail_saves(&self, should_fail: bool) {
        *self.save_should_fail.lock().unwrap() = should_fail;
    }

    /// Configure whether load should fail.
    pub fn fail_loads(&self, should_fail: bool) {
        *self.load_should_fail.lock().unwrap() = should_fail;
    }
}

#[async_trait]
impl ConfigStorage for InMemoryConfigStorage {
    async fn load(&self) -> Result<ConfigDocument, StorageError> {
        if *self.load_should_fail.lock().unwrap() {
            return Err(StorageError::LoadFailed("Mock load failure".to_string()));
        }
        Ok(self.document())
    }

    async fn save(&self, document: &ConfigDocument) -> Result<(), StorageError> {
        if *self.save_should_fail.lock().unwrap() {
            return Err(StorageError::SaveFailed("Mock save failure".to_string()));
        }
        *self.document.lock().unwrap() = document.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::AdapterKind;
    use crate::store::WidgetConfig;

    #[tokio::test]
    async fn test_save_and_load() {
        let storage = InMemoryConfigStorage::new();
        assert!(storage.load().await.unwrap().widgets.is_empty());

        let mut doc = ConfigDocument::default();
        doc.widgets.insert(
            "w-1".to_string(),
            WidgetConfig::new("w-1", AdapterKind::Github, "api.github.com"),
        );
        storage.save(&doc).await.unwrap();

        assert_eq!(storage.load().await.unwrap(), doc);
        assert_eq!(storage.save_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_failures() {
        let storage = InMemoryConfigStorage::new();
        storage.fail_loads(true);
        assert!(matches!(storage.load().await, Err(StorageError::LoadFailed(_))));

        storage.fail_saves(true);
        assert!(matches!(
            storage.save(&ConfigDocument::default()).await,
            Err(StorageError::SaveFailed(_))
        ));
        assert_eq!(storage.save_count(), 0);
    }
}
