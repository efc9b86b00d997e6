//! Persisted widget records and their public projections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::codec::SENTINEL;
use crate::integrations::AdapterKind;
use crate::traits::Target;

/// The persisted document: `{ "widgets": { id: WidgetConfig } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub widgets: BTreeMap<String, WidgetConfig>,
}

/// One widget's configuration. `secrets` holds ciphertexts only.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub id: String,
    pub kind: AdapterKind,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

impl WidgetConfig {
    pub fn new(id: impl Into<String>, kind: AdapterKind, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            host: host.into(),
            port: None,
            ssl: false,
            username: None,
            options: Map::new(),
            secrets: BTreeMap::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Submit a secret value; on `create` it goes through the same rules as
    /// [`super::CredentialStore::set_field`].
    pub fn with_secret(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(field.into(), value.into());
        self
    }

    /// Endpoint description handed to the integration.
    pub fn target(&self) -> Target {
        Target {
            widget_id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            ssl: self.ssl,
            options: self.options.clone(),
        }
    }
}

impl fmt::Debug for WidgetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetConfig")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("username", &self.username)
            .field("options", &self.options)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The secret side of a widget: field name to ciphertext.
#[derive(Clone, PartialEq)]
pub struct WidgetCredential {
    pub widget_id: String,
    pub kind: AdapterKind,
    pub secret_fields: BTreeMap<String, String>,
}

impl WidgetCredential {
    pub(crate) fn from_config(config: &WidgetConfig) -> Self {
        Self {
            widget_id: config.id.clone(),
            kind: config.kind,
            secret_fields: config.secrets.clone(),
        }
    }

    /// Field name to "is set", covering every field the adapter kind knows
    /// plus any stored field.
    pub fn has_secret_flags(&self) -> BTreeMap<String, bool> {
        let mut flags: BTreeMap<String, bool> = self
            .kind
            .secret_fields()
            .iter()
            .map(|field| (field.to_string(), false))
            .collect();
        for field in self.secret_fields.keys() {
            flags.insert(field.clone(), true);
        }
        flags
    }
}

impl fmt::Debug for WidgetCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetCredential")
            .field("widget_id", &self.widget_id)
            .field("kind", &self.kind)
            .field("has_secret_flags", &self.has_secret_flags())
            .finish()
    }
}

/// Result of submitting a secret value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldUpdate {
    /// The sentinel was submitted, or an empty value for an unset field.
    Unchanged,
    /// A pre-encrypted value was stored as submitted.
    StoredVerbatim,
    /// A plaintext value was encrypted and stored.
    Encrypted,
    /// An empty value removed the stored secret.
    Cleared,
}

impl FieldUpdate {
    pub fn is_change(&self) -> bool {
        !matches!(self, FieldUpdate::Unchanged)
    }
}

/// Non-secret edits; `None` leaves a setting as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub host: Option<String>,
    pub port: Option<Option<u16>>,
    pub ssl: Option<bool>,
    pub username: Option<Option<String>>,
    pub options: Option<Map<String, Value>>,
}

impl SettingsUpdate {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = Some(port);
        self
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = Some(username);
        self
    }

    pub fn options(mut self, options: Map<String, Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Apply to `config`, returning true if anything changed.
    pub(crate) fn apply(self, config: &mut WidgetConfig) -> bool {
        let before = config.clone();
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ssl) = self.ssl {
            config.ssl = ssl;
        }
        if let Some(username) = self.username {
            config.username = username.filter(|u| !u.is_empty());
        }
        if let Some(options) = self.options {
            config.options = options;
        }
        *config != before
    }
}

/// What the presentation layer may see of a widget.
///
/// Secret fields are present only as the sentinel, next to `_hasPassword`
/// style flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicWidgetConfig {
    pub id: String,
    pub kind: AdapterKind,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub options: Map<String, Value>,
    pub secrets: BTreeMap<String, String>,
    #[serde(flatten)]
    pub flags: BTreeMap<String, bool>,
}

impl PublicWidgetConfig {
    pub(crate) fn from_config(config: &WidgetConfig) -> Self {
        let credential = WidgetCredential::from_config(config);
        let flags = credential
            .has_secret_flags()
            .into_iter()
            .map(|(field, set)| (flag_name(&field), set))
            .collect();
        let secrets = config
            .secrets
            .keys()
            .map(|field| (field.clone(), SENTINEL.to_string()))
            .collect();

        Self {
            id: config.id.clone(),
            kind: config.kind,
            host: config.host.clone(),
            port: config.port,
            ssl: config.ssl,
            username: config.username.clone(),
            options: config.options.clone(),
            secrets,
            flags,
        }
    }

    pub fn has_secret(&self, field: &str) -> bool {
        self.flags.get(&flag_name(field)).copied().unwrap_or(false)
    }
}

/// `apiToken` becomes `_hasApiToken`.
pub fn flag_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("_has{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "_has".to_string(),
    }
}
