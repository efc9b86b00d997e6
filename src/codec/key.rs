//! Key material for the secret codec.
//!
//! The 256-bit key comes from, in order:
//! 1. an explicit key string (`DECKHAND_SECRET_KEY`): a base64-encoded 32-byte
//!    key, or any other string, which is treated as a passphrase and hashed
//!    with SHA-256;
//! 2. a key file holding a base64-encoded key, generated on first use.

use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::CodecError;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// A 256-bit codec key. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a key from configured material.
    ///
    /// A value that decodes as base64 to exactly 32 bytes is used as-is;
    /// anything else is hashed with SHA-256.
    pub fn from_material(material: &str) -> Result<Self, CodecError> {
        let material = material.trim();
        if material.is_empty() {
            return Err(CodecError::Key("key material is empty".to_string()));
        }

        if let Ok(decoded) = STANDARD.decode(material) {
            if let Ok(bytes) = <[u8; KEY_LEN]>::try_from(decoded.as_slice()) {
                return Ok(Self(bytes));
            }
        }

        let digest = Sha256::digest(material.as_bytes());
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&digest);
        Ok(Self(bytes))
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Base64 form, as written to key files.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Load the key stored at `path`, generating and persisting a new one if
    /// the file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, CodecError> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| CodecError::Key(format!("cannot read {}: {}", path.display(), e)))?;
            let decoded = STANDARD
                .decode(contents.trim())
                .map_err(|e| CodecError::Key(format!("{} is not base64: {}", path.display(), e)))?;
            let bytes = <[u8; KEY_LEN]>::try_from(decoded.as_slice()).map_err(|_| {
                CodecError::Key(format!(
                    "{} holds {} bytes, expected {}",
                    path.display(),
                    decoded.len(),
                    KEY_LEN
                ))
            })?;
            return Ok(Self(bytes));
        }

        let key = Self::generate();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CodecError::Key(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, key.to_base64())
            .map_err(|e| CodecError::Key(format!("cannot write {}: {}", path.display(), e)))?;
        restrict_permissions(path);
        tracing::info!("Generated new secret key at {}", path.display());
        Ok(key)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
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
