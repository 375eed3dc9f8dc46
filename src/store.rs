//! Durable key-value storage for credentials and settings.
//!
//! Records are JSON values keyed by name: `credentials` holds one entry per
//! tenant id, `settings` holds the [`Settings`] record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::error::Result;

const CREDENTIALS_KEY: &str = "credentials";
const SETTINGS_KEY: &str = "settings";

/// A persisted access token for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub uid: String,
}

/// Generic durable key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Non-durable store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.records.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every `set` rewrites the whole file; the lock serializes writers within
/// the process.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<serde_json::Map<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => match serde_json::from_str(&json)? {
                Value::Object(map) => Ok(map),
                _ => Ok(serde_json::Map::new()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&Value::Object(records))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Typed view over the `credentials` and `settings` records.
///
/// Credential updates rewrite the whole `credentials` record, so they are
/// serialized by `update_lock` from read to write.
pub struct CredentialStore<S: ?Sized> {
    update_lock: Mutex<()>,
    store: std::sync::Arc<S>,
}

impl<S: KeyValueStore + ?Sized> CredentialStore<S> {
    pub fn new(store: std::sync::Arc<S>) -> Self {
        Self {
            update_lock: Mutex::new(()),
            store,
        }
    }

    async fn credentials(&self) -> Result<HashMap<String, Credential>> {
        match self.store.get(CREDENTIALS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(HashMap::new()),
        }
    }

    pub async fn get(&self, tenant_id: &str) -> Result<Option<Credential>> {
        Ok(self.credentials().await?.remove(tenant_id))
    }

    pub async fn put(&self, tenant_id: &str, credential: Credential) -> Result<()> {
        let _guard = self.update_lock.lock().await;
        let mut credentials = self.credentials().await?;
        credentials.insert(tenant_id.to_string(), credential);
        self.store
            .set(CREDENTIALS_KEY, serde_json::to_value(credentials)?)
            .await
    }

    /// Returns the removed credential, if one existed.
    pub async fn remove(&self, tenant_id: &str) -> Result<Option<Credential>> {
        let _guard = self.update_lock.lock().await;
        let mut credentials = self.credentials().await?;
        let removed = credentials.remove(tenant_id);
        if removed.is_some() {
            self.store
                .set(CREDENTIALS_KEY, serde_json::to_value(credentials)?)
                .await?;
        }
        Ok(removed)
    }

    /// Current settings; a missing record yields defaults.
    pub async fn settings(&self) -> Result<Settings> {
        match self.store.get(SETTINGS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Settings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store
            .set(SETTINGS_KEY, serde_json::to_value(settings)?)
            .await
    }
}
