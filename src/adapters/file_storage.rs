//! File-based configuration storage adapter.
//!
//! The document is written as pretty JSON to `~/.deckhand/widgets.json` unless
//! another path is configured. Writes go to a sibling temp file first and are
//! renamed into place.

use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::store::ConfigDocument;
use crate::traits::{ConfigStorage, StorageError};

/// Directory under the home directory holding deckhand state.
pub const STATE_DIR: &str = ".deckhand";

/// Default document file name.
pub const WIDGETS_FILE: &str = "widgets.json";

/// File-based configuration storage.
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    path: PathBuf,
}

impl FileConfigStorage {
    /// Storage at the default location.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self::at(home.join(STATE_DIR).join(WIDGETS_FILE)))
    }

    /// Storage at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, document: &ConfigDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| StorageError::SaveFailed(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let file = File::create(&tmp)
            .map_err(|e| StorageError::SaveFailed(format!("{}: {}", tmp.display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| StorageError::SaveFailed(e.to_string()))?;
        drop(writer);

        restrict_permissions(&tmp);
        fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::SaveFailed(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl ConfigStorage for FileConfigStorage {
    async fn load(&self) -> Result<ConfigDocument, StorageError> {
        if !self.path.exists() {
            return Ok(ConfigDocument::default());
        }

        let file = File::open(&self.path)
            .map_err(|e| StorageError::LoadFailed(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn save(&self, document: &ConfigDocument) -> Result<(), StorageError> {
        self.write_document(document)?;
        tracing::debug!("Saved {} widget(s) to {}", document.widgets.len(), self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
