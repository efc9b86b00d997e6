//! Runtime configuration.
//!
//! Built with `with_*` setters or read from `DECKHAND_*` environment variables.

use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::file_storage::{STATE_DIR, WIDGETS_FILE};
use crate::codec::{CodecError, SecretKey};

pub const ENV_CONFIG: &str = "DECKHAND_CONFIG";
pub const ENV_KEY_FILE: &str = "DECKHAND_KEY_FILE";
pub const ENV_SECRET_KEY: &str = "DECKHAND_SECRET_KEY";
pub const ENV_HTTP_TIMEOUT: &str = "DECKHAND_HTTP_TIMEOUT_SECS";
pub const ENV_PROBE_TIMEOUT: &str = "DECKHAND_PROBE_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL: &str = "DECKHAND_POLL_INTERVAL_SECS";

const KEY_FILE: &str = "secret.key";

/// Configuration for a [`crate::hub::Hub`].
///
/// # Example
///
/// ```ignore
/// let config = DeckConfig::default()
///     .with_config_path("/srv/deckhand/widgets.json")
///     .with_http_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DeckConfig {
    /// Widgets document; `~/.deckhand/widgets.json` when unset.
    pub config_path: Option<PathBuf>,
    /// Key file; `~/.deckhand/secret.key` when unset.
    pub key_file: Option<PathBuf>,
    /// Key material that takes precedence over the key file.
    pub secret_key: Option<SecretString>,
    /// Client timeout for credentialed integrations.
    pub http_timeout: Duration,
    /// Client timeout for reachability probes.
    pub probe_timeout: Duration,
    /// Default interval for `watch`.
    pub poll_interval: Duration,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            key_file: None,
            secret_key: None,
            http_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl DeckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn with_secret_key(mut self, material: impl Into<String>) -> Self {
        self.secret_key = Some(SecretString::from(material.into()));
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Read `DECKHAND_*` variables. Unparsable numbers keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`DeckConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let seconds = |name: &str| {
            let value = non_empty(name)?;
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!("Ignoring {}={:?}: expected a positive number of seconds", name, value);
                    None
                }
            }
        };

        let mut config = Self::default();
        if let Some(path) = non_empty(ENV_CONFIG) {
            config = config.with_config_path(path);
        }
        if let Some(path) = non_empty(ENV_KEY_FILE) {
            config = config.with_key_file(path);
        }
        if let Some(material) = non_empty(ENV_SECRET_KEY) {
            config = config.with_secret_key(material);
        }
        if let Some(timeout) = seconds(ENV_HTTP_TIMEOUT) {
            config = config.with_http_timeout(timeout);
        }
        if let Some(timeout) = seconds(ENV_PROBE_TIMEOUT) {
            config = config.with_probe_timeout(timeout);
        }
        if let Some(interval) = seconds(ENV_POLL_INTERVAL) {
            config = config.with_poll_interval(interval);
        }
        config
    }

    /// Widgets document path, falling back to the home directory.
    pub fn resolved_config_path(&self) -> Option<PathBuf> {
        self.config_path
            .clone()
            .or_else(|| state_dir().map(|dir| dir.join(WIDGETS_FILE)))
    }

    /// Key file path, falling back to the home directory.
    pub fn resolved_key_file(&self) -> Option<PathBuf> {
        self.key_file
            .clone()
            .or_else(|| state_dir().map(|dir| dir.join(KEY_FILE)))
    }

    /// The key from explicit material, or from the key file (created on first use).
    pub fn load_key(&self) -> Result<SecretKey, CodecError> {
        if let Some(material) = &self.secret_key {
            return SecretKey::from_material(material.expose_secret());
        }
        let path = self
            .resolved_key_file()
            .ok_or_else(|| CodecError::Key("no home directory for the key file".to_string()))?;
        SecretKey::load_or_create(&path)
    }

    /// Longest time one adapter call may take: the client timeout plus slack
    /// for integrations that make several requests.
    pub fn operation_timeout(&self) -> Duration {
        self.http_timeout.max(self.probe_timeout) * 2
    }
}

fn state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(STATE_DIR))
}
