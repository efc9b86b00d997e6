//! Widget configuration store with encrypted secret fields.

use secrecy::SecretString;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Mutex as AsyncMutex, RwLock};

use super::widget::{
    ConfigDocument, FieldUpdate, PublicWidgetConfig, SettingsUpdate, WidgetConfig,
    WidgetCredential,
};
use super::StoreError;
use crate::codec::{is_already_encrypted, is_sentinel, SecretCodec};
use crate::integrations::AdapterKind;
use crate::traits::{ConfigStorage, Credentials};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Owns the widget document, encrypts submitted secrets and persists every
/// effective change through a [`ConfigStorage`].
///
/// Secret submissions for one widget are applied one at a time; submissions
/// for different widgets only contend on the final write.
pub struct CredentialStore {
    storage: Arc<dyn ConfigStorage>,
    codec: SecretCodec,
    document: RwLock<ConfigDocument>,
    field_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    changes: broadcast::Sender<String>,
}

impl CredentialStore {
    /// Load the persisted document.
    pub async fn open(
        storage: Arc<dyn ConfigStorage>,
        codec: SecretCodec,
    ) -> Result<Self, StoreError> {
        let document = storage.load().await?;
        tracing::debug!("Loaded {} widget(s) from storage", document.widgets.len());
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            storage,
            codec,
            document: RwLock::new(document),
            field_locks: Mutex::new(HashMap::new()),
            changes,
        })
    }

    /// Register a new widget. Secrets in `config.secrets` are treated as
    /// submitted values.
    pub async fn create(&self, config: WidgetConfig) -> Result<PublicWidgetConfig, StoreError> {
        validate_config(&config)?;

        let mut stored = config.clone();
        stored.secrets.clear();
        for (field, submitted) in &config.secrets {
            validate_field(&config, field)?;
            if is_sentinel(submitted) || submitted.is_empty() {
                continue;
            }
            let value = self.seal(submitted)?;
            stored.secrets.insert(field.clone(), value);
        }
        validate_secret_set(stored.kind, stored.secrets.keys().map(String::as_str))?;

        let id = stored.id.clone();
        self.commit(|doc| {
            if doc.widgets.contains_key(&id) {
                return Err(StoreError::AlreadyExists(id.clone()));
            }
            doc.widgets.insert(id.clone(), stored.clone());
            Ok(true)
        })
        .await?;

        tracing::info!(widget_id = %id, adapter = %stored.kind, "Widget created");
        Ok(PublicWidgetConfig::from_config(&stored))
    }

    /// Widget ids in stable order.
    pub async fn list(&self) -> Vec<String> {
        self.document.read().await.widgets.keys().cloned().collect()
    }

    pub async fn get(&self, widget_id: &str) -> Result<WidgetCredential, StoreError> {
        let doc = self.document.read().await;
        doc.widgets
            .get(widget_id)
            .map(WidgetCredential::from_config)
            .ok_or_else(|| StoreError::NotFound(widget_id.to_string()))
    }

    /// Full configuration, secrets still encrypted.
    pub async fn config(&self, widget_id: &str) -> Result<WidgetConfig, StoreError> {
        let doc = self.document.read().await;
        doc.widgets
            .get(widget_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(widget_id.to_string()))
    }

    /// Apply a submitted secret value.
    ///
    /// - the sentinel leaves the field untouched;
    /// - an already-encrypted value is stored verbatim;
    /// - an empty value clears the field;
    /// - anything else is encrypted and stored.
    pub async fn set_field(
        &self,
        widget_id: &str,
        field: &str,
        submitted: &str,
    ) -> Result<FieldUpdate, StoreError> {
        let lock = self.field_lock(widget_id);
        let _guard = lock.lock().await;

        let config = self.config(widget_id).await?;
        validate_field(&config, field)?;

        let update = if is_sentinel(submitted) {
            FieldUpdate::Unchanged
        } else if submitted.is_empty() {
            if config.secrets.contains_key(field) {
                FieldUpdate::Cleared
            } else {
                FieldUpdate::Unchanged
            }
        } else if is_already_encrypted(submitted) {
            FieldUpdate::StoredVerbatim
        } else {
            FieldUpdate::Encrypted
        };

        if !update.is_change() {
            tracing::debug!(widget_id, field, "Secret unchanged");
            return Ok(update);
        }
        if update != FieldUpdate::Cleared {
            validate_secret_set(
                config.kind,
                config.secrets.keys().map(String::as_str).chain([field]),
            )?;
        }

        let sealed = match update {
            FieldUpdate::StoredVerbatim => Some(submitted.to_string()),
            FieldUpdate::Encrypted => Some(self.codec.encrypt(submitted)?),
            _ => None,
        };

        self.commit(|doc| {
            let widget = doc
                .widgets
                .get_mut(widget_id)
                .ok_or_else(|| StoreError::NotFound(widget_id.to_string()))?;
            match &sealed {
                Some(value) => widget.secrets.insert(field.to_string(), value.clone()),
                None => widget.secrets.remove(field),
            };
            Ok(true)
        })
        .await?;

        tracing::info!(widget_id, field, update = ?update, "Secret updated");
        self.notify(widget_id);
        Ok(update)
    }

    /// Decrypt one secret field.
    ///
    /// [`CredentialStore::credentials`] is the batch form used for logins: it
    /// opens every field of a single configuration snapshot.
    pub(crate) async fn reveal(
        &self,
        widget_id: &str,
        field: &str,
    ) -> Result<Option<SecretString>, StoreError> {
        let config = self.config(widget_id).await?;
        self.open_field(&config, field)
    }

    /// Username plus every decrypted secret, for a login attempt.
    pub(crate) async fn credentials(&self, widget_id: &str) -> Result<Credentials, StoreError> {
        let config = self.config(widget_id).await?;
        let mut credentials = Credentials::new(config.username.clone());
        for field in config.secrets.keys() {
            if let Some(secret) = self.open_field(&config, field)? {
                credentials.insert(field.clone(), secret);
            }
        }
        Ok(credentials)
    }

    fn open_field(
        &self,
        config: &WidgetConfig,
        field: &str,
    ) -> Result<Option<SecretString>, StoreError> {
        let Some(ciphertext) = config.secrets.get(field) else {
            return Ok(None);
        };
        let plaintext = self.codec.decrypt(ciphertext).map_err(|e| {
            tracing::warn!(widget_id = %config.id, field, "Stored secret cannot be decrypted");
            e
        })?;
        Ok(Some(SecretString::from(plaintext)))
    }

    /// `hasSecretFlags` for the widget.
    pub async fn to_public_view(&self, widget_id: &str) -> Result<BTreeMap<String, bool>, StoreError> {
        Ok(self.get(widget_id).await?.has_secret_flags())
    }

    pub async fn public_config(&self, widget_id: &str) -> Result<PublicWidgetConfig, StoreError> {
        Ok(PublicWidgetConfig::from_config(&self.config(widget_id).await?))
    }

    /// Public configuration of every widget.
    pub async fn public_configs(&self) -> Vec<PublicWidgetConfig> {
        let doc = self.document.read().await;
        doc.widgets.values().map(PublicWidgetConfig::from_config).collect()
    }

    /// Apply non-secret edits. Returns true if anything changed.
    pub async fn update_settings(
        &self,
        widget_id: &str,
        update: SettingsUpdate,
    ) -> Result<bool, StoreError> {
        let changed = self
            .commit(|doc| {
                let widget = doc
                    .widgets
                    .get_mut(widget_id)
                    .ok_or_else(|| StoreError::NotFound(widget_id.to_string()))?;
                let mut edited = widget.clone();
                if !update.clone().apply(&mut edited) {
                    return Ok(false);
                }
                validate_config(&edited)?;
                *widget = edited;
                Ok(true)
            })
            .await?;

        if changed {
            tracing::info!(widget_id, "Widget settings updated");
            self.notify(widget_id);
        }
        Ok(changed)
    }

    /// Delete the widget record.
    pub async fn remove(&self, widget_id: &str) -> Result<(), StoreError> {
        self.commit(|doc| {
            doc.widgets
                .remove(widget_id)
                .map(|_| true)
                .ok_or_else(|| StoreError::NotFound(widget_id.to_string()))
        })
        .await?;

        self.field_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(widget_id);
        tracing::info!(widget_id, "Widget removed");
        self.notify(widget_id);
        Ok(())
    }

    /// Receive the id of every widget whose configuration changed.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    fn seal(&self, submitted: &str) -> Result<String, StoreError> {
        if is_already_encrypted(submitted) {
            Ok(submitted.to_string())
        } else {
            Ok(self.codec.encrypt(submitted)?)
        }
    }

    fn field_lock(&self, widget_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.field_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(widget_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn notify(&self, widget_id: &str) {
        // No receivers is fine.
        let _ = self.changes.send(widget_id.to_string());
    }

    /// Edit a copy of the document, persist it, then swap it in. The in-memory
    /// document never runs ahead of storage.
    async fn commit<F>(&self, edit: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<bool, StoreError>,
    {
        let mut doc = self.document.write().await;
        let mut next = doc.clone();
        if !edit(&mut next)? {
            return Ok(false);
        }
        self.storage.save(&next).await.map_err(|e| {
            tracing::error!("Failed to persist widget configuration: {}", e);
            e
        })?;
        *doc = next;
        Ok(true)
    }
}

fn validate_config(config: &WidgetConfig) -> Result<(), StoreError> {
    if config.id.trim().is_empty() {
        return Err(StoreError::Invalid("widget id is empty".to_string()));
    }
    if config.host.trim().is_empty() {
        return Err(StoreError::Invalid(format!(
            "widget '{}' has no host",
            config.id
        )));
    }
    Ok(())
}

fn validate_field(config: &WidgetConfig, field: &str) -> Result<(), StoreError> {
    if config.kind.secret_fields().contains(&field) {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!(
            "'{}' is not a secret field of {} widgets",
            field, config.kind
        )))
    }
}

/// Kinds that take one secret reject a second one when it is submitted.
fn validate_secret_set<'a>(
    kind: AdapterKind,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<(), StoreError> {
    let fields: BTreeSet<&str> = fields.into_iter().collect();
    if kind.single_secret() && fields.len() > 1 {
        let names: Vec<&str> = fields.into_iter().collect();
        return Err(StoreError::Invalid(format!(
            "{} widgets take one secret, not {}",
            kind,
            names.join(" and ")
        )));
    }
    Ok(())
}
