//! Tenant registry: mount lifecycle and operation dispatch.
//!
//! Each tenant is either `Cold` (no live session, possibly a persisted
//! credential) or `Active` (one live [`Session`]). Every operation goes
//! through [`Registry::ensure_active`], which resumes a cold tenant from
//! its stored credential, and through a dispatch wrapper that turns a
//! rejected access token into a tenant-wide unmount.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use super::session::Session;
use crate::api::ApiClient;
use crate::config::{Config, Settings};
use crate::error::{FsError, Result};
use crate::fs::{
    Client, EntryMetadata, MetadataFields, OpenMode, PartialEntry, ReadResult, normalize_path,
};
use crate::host::{Authorizer, MountOptions, ProviderHost};
use crate::http::HttpTransport;
use crate::store::{Credential, CredentialStore, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Cold,
    Active,
}

pub struct Registry {
    config: Config,
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore<dyn KeyValueStore>,
    host: Arc<dyn ProviderHost>,
    authorizer: Arc<dyn Authorizer>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    /// Serializes session creation and teardown so a tenant never gets two
    /// sessions and an unmounted tenant never gets one back.
    lifecycle_lock: Mutex<()>,
}

impl Registry {
    pub fn new(
        config: Config,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn ProviderHost>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            config,
            transport,
            store: CredentialStore::new(store),
            host,
            authorizer,
            sessions: RwLock::new(HashMap::new()),
            lifecycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn store(&self) -> &CredentialStore<dyn KeyValueStore> {
        &self.store
    }

    pub(crate) fn host(&self) -> &Arc<dyn ProviderHost> {
        &self.host
    }

    /// Tenant id for a Dropbox account id, e.g. `dropboxfs://dbid:AAH4`.
    pub fn tenant_id(&self, uid: &str) -> String {
        format!("{}://{}", self.config.file_system_scheme, uid)
    }

    pub async fn lifecycle(&self, tenant_id: &str) -> Lifecycle {
        if self.sessions.read().await.contains_key(tenant_id) {
            Lifecycle::Active
        } else {
            Lifecycle::Cold
        }
    }

    pub(crate) async fn active_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    fn build_session(
        &self,
        tenant_id: &str,
        api: ApiClient,
        uid: String,
        settings: &Settings,
    ) -> Arc<Session> {
        let client = Client::new(api, uid, &self.config, settings);
        Arc::new(Session::new(tenant_id.to_string(), client))
    }

    /// Authorize a new account and mount it. Returns the tenant id.
    pub async fn mount(&self) -> Result<String> {
        let token = self.authorizer.authorize().await?;
        let api = ApiClient::new(self.transport.clone(), token.clone(), &self.config);
        let user = api.get_current_user().await?;
        let tenant_id = self.tenant_id(&user.uid);

        let _guard = self.lifecycle_lock.lock().await;
        if self.sessions.read().await.contains_key(&tenant_id)
            || self
                .host
                .mounted_file_systems()
                .await?
                .contains(&tenant_id)
        {
            return Err(FsError::AlreadyMounted(tenant_id));
        }

        let settings = self.store.settings().await?;
        self.store
            .put(
                &tenant_id,
                Credential {
                    access_token: token,
                    uid: user.uid.clone(),
                },
            )
            .await?;

        let options = MountOptions {
            file_system_id: tenant_id.clone(),
            display_name: format!(
                "{} ({})",
                self.config.display_name_prefix, user.display_name
            ),
            writable: true,
            opened_files_limit: settings.opened_files_limit,
        };
        if let Err(e) = self.host.mount(options).await {
            if let Err(purge) = self.store.remove(&tenant_id).await {
                warn!(tenant = %tenant_id, error = %purge, "failed to drop credential");
            }
            return Err(e);
        }

        let session = self.build_session(&tenant_id, api, user.uid, &settings);
        self.sessions
            .write()
            .await
            .insert(tenant_id.clone(), session);
        info!(tenant = %tenant_id, user = %user.display_name, "mounted");
        Ok(tenant_id)
    }

    /// Rebuild the session of a cold tenant from its stored credential.
    pub async fn resume(&self, tenant_id: &str) -> Result<()> {
        self.resume_session(tenant_id).await.map(|_| ())
    }

    async fn resume_session(&self, tenant_id: &str) -> Result<Arc<Session>> {
        let _guard = self.lifecycle_lock.lock().await;
        if let Some(session) = self.sessions.read().await.get(tenant_id) {
            return Ok(session.clone());
        }

        let credential = self
            .store
            .get(tenant_id)
            .await?
            .ok_or_else(|| FsError::CredentialNotFound(tenant_id.to_string()))?;
        let settings = self.store.settings().await?;
        let api = ApiClient::new(
            self.transport.clone(),
            credential.access_token,
            &self.config,
        );
        let session = self.build_session(tenant_id, api, credential.uid, &settings);
        self.sessions
            .write()
            .await
            .insert(tenant_id.to_string(), session.clone());
        info!(tenant = tenant_id, "resumed");
        Ok(session)
    }

    /// Tear a tenant down: revoke the token (best effort), drop the
    /// credential and the session, unmount from the host. Idempotent.
    pub async fn unmount(&self, tenant_id: &str) -> Result<()> {
        let _guard = self.lifecycle_lock.lock().await;
        let session = self.sessions.write().await.remove(tenant_id);
        let (credential, store_error) = match self.store.remove(tenant_id).await {
            Ok(credential) => (credential, None),
            Err(e) => {
                error!(tenant = tenant_id, error = %e, "failed to drop credential");
                (None, Some(e))
            }
        };

        let api = match (&session, credential) {
            (Some(session), _) => Some(session.client().api().clone()),
            (None, Some(credential)) => Some(ApiClient::new(
                self.transport.clone(),
                credential.access_token,
                &self.config,
            )),
            (None, None) => None,
        };
        if let Some(api) = api {
            match tokio::time::timeout(self.config.request_timeout, api.revoke()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(tenant = tenant_id, error = %e, "token revoke failed"),
                Err(_) => warn!(tenant = tenant_id, "token revoke timed out"),
            }
        }

        if self
            .host
            .mounted_file_systems()
            .await?
            .iter()
            .any(|id| id == tenant_id)
        {
            self.host.unmount(tenant_id).await?;
        }
        if session.is_some() {
            info!(tenant = tenant_id, "unmounted");
        }
        match store_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Host-initiated unmount.
    pub async fn on_unmount_requested(&self, tenant_id: &str) -> Result<()> {
        self.unmount(tenant_id).await
    }

    /// The live session of `tenant_id`, resuming it if needed. A failed
    /// resume unregisters the tenant and reports a plain failure.
    pub async fn ensure_active(&self, tenant_id: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.read().await.get(tenant_id) {
            return Ok(session.clone());
        }

        match self.resume_session(tenant_id).await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(tenant = tenant_id, error = %e, "resume failed, unregistering");
                self.purge(tenant_id).await;
                Err(FsError::ResumeFailed {
                    tenant: tenant_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn purge(&self, tenant_id: &str) {
        let _guard = self.lifecycle_lock.lock().await;
        if let Err(e) = self.store.remove(tenant_id).await {
            warn!(tenant = tenant_id, error = %e, "failed to drop credential");
        }
        match self.host.mounted_file_systems().await {
            Ok(ids) if ids.iter().any(|id| id == tenant_id) => {
                if let Err(e) = self.host.unmount(tenant_id).await {
                    warn!(tenant = tenant_id, error = %e, "host unmount failed");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(tenant = tenant_id, error = %e, "host mount list unavailable"),
        }
    }

    /// Run `op` against the live session, escalating an expired token to
    /// an unmount of the whole tenant.
    async fn dispatch<T, F, Fut>(&self, tenant_id: &str, op: F) -> Result<T>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.ensure_active(tenant_id).await?;
        match op(session).await {
            Err(FsError::AccessTokenExpired) => {
                self.expire(tenant_id).await;
                Err(FsError::AccessTokenExpired)
            }
            other => other,
        }
    }

    pub(crate) async fn expire(&self, tenant_id: &str) {
        error!(tenant = tenant_id, "access token rejected, unmounting");
        if let Err(e) = self.unmount(tenant_id).await {
            error!(tenant = tenant_id, error = %e, "unmount after token expiry failed");
        }
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        path: &str,
        fields: &MetadataFields,
    ) -> Result<Vec<PartialEntry>> {
        let path = normalize_path(path);
        let entries = self
            .dispatch(tenant_id, |s| async move { s.list(&path).await })
            .await?;
        Ok(entries.iter().map(|e| e.trim(fields)).collect())
    }

    pub async fn stat(
        &self,
        tenant_id: &str,
        path: &str,
        fields: &MetadataFields,
    ) -> Result<PartialEntry> {
        let path = normalize_path(path);
        let want_thumbnail = fields.thumbnail;
        let entry: EntryMetadata = self
            .dispatch(tenant_id, |s| async move {
                s.stat(&path, want_thumbnail).await
            })
            .await?;
        Ok(entry.trim(fields))
    }

    pub async fn open(
        &self,
        tenant_id: &str,
        request_id: &str,
        path: &str,
        mode: OpenMode,
    ) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move {
            s.open(request_id, &path, mode).await;
            Ok(())
        })
        .await
    }

    pub async fn read(
        &self,
        tenant_id: &str,
        request_id: &str,
        offset: u64,
        length: u64,
    ) -> Result<ReadResult> {
        self.dispatch(tenant_id, |s| async move {
            s.read(request_id, offset, length).await
        })
        .await
    }

    pub async fn write(
        &self,
        tenant_id: &str,
        request_id: &str,
        data: &[u8],
        offset: u64,
    ) -> Result<()> {
        self.dispatch(tenant_id, |s| async move {
            s.write(request_id, data, offset).await
        })
        .await
    }

    pub async fn close(&self, tenant_id: &str, request_id: &str) -> Result<()> {
        self.dispatch(tenant_id, |s| async move { s.close(request_id).await })
            .await
    }

    pub async fn create_directory(&self, tenant_id: &str, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move { s.create_directory(&path).await })
            .await
    }

    pub async fn delete(&self, tenant_id: &str, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move { s.delete(&path).await })
            .await
    }

    pub async fn move_entry(&self, tenant_id: &str, source: &str, target: &str) -> Result<()> {
        let (source, target) = (normalize_path(source), normalize_path(target));
        self.dispatch(tenant_id, |s| async move {
            s.move_entry(&source, &target).await
        })
        .await
    }

    pub async fn copy_entry(&self, tenant_id: &str, source: &str, target: &str) -> Result<()> {
        let (source, target) = (normalize_path(source), normalize_path(target));
        self.dispatch(tenant_id, |s| async move {
            s.copy_entry(&source, &target).await
        })
        .await
    }

    pub async fn create_file(&self, tenant_id: &str, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move { s.create_file(&path).await })
            .await
    }

    pub async fn truncate(&self, tenant_id: &str, path: &str, length: u64) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move { s.truncate(&path, length).await })
            .await
    }

    pub async fn add_watcher(&self, tenant_id: &str, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move { s.add_watcher(&path).await })
            .await
    }

    pub async fn remove_watcher(&self, tenant_id: &str, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.dispatch(tenant_id, |s| async move {
            if !s.remove_watcher(&path).await {
                warn!(path = %path, "watcher was not registered");
            }
            Ok(())
        })
        .await
    }
}
