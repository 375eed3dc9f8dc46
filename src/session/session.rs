//! The per-tenant session aggregate.
//!
//! A [`Session`] bundles everything that lives and dies with one mounted
//! tenant: the remote adapter, the metadata cache, the watcher set and the
//! open-file-handle table.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FsError, Result};
use crate::fs::{Client, EntryMetadata, Lookup, MetadataCache, OpenFile, OpenMode, ReadResult};

pub struct Session {
    pub(crate) tenant_id: String,
    pub(crate) client: Client,
    pub(crate) cache: Mutex<MetadataCache>,
    pub(crate) watchers: Mutex<BTreeSet<String>>,
    handles: Mutex<HashMap<String, Arc<Mutex<OpenFile>>>>,
}

impl Session {
    pub fn new(tenant_id: String, client: Client) -> Self {
        Self {
            tenant_id,
            client,
            cache: Mutex::new(MetadataCache::new()),
            watchers: Mutex::new(BTreeSet::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// List `path` and replace its cached listing with the full result.
    pub async fn list(&self, path: &str) -> Result<Vec<EntryMetadata>> {
        let entries = self.client.read_directory(path).await?;
        self.cache.lock().await.put(path, entries.clone());
        Ok(entries)
    }

    /// Stat `path`, answering from a cached parent listing when possible.
    /// Thumbnails are never cached, so asking for one always goes remote.
    pub async fn stat(&self, path: &str, want_thumbnail: bool) -> Result<EntryMetadata> {
        if !want_thumbnail {
            match self.cache.lock().await.get(path) {
                Lookup::Found(entry) => {
                    debug!(path, "stat served from cache");
                    return Ok(entry);
                }
                Lookup::Missing => return Err(FsError::NotFound(path.to_string())),
                Lookup::NotCached => {}
            }
        }
        self.client.get_metadata(path, want_thumbnail).await
    }

    pub async fn open(&self, request_id: &str, path: &str, mode: OpenMode) {
        let file = OpenFile::new(path.to_string(), mode);
        self.handles
            .lock()
            .await
            .insert(request_id.to_string(), Arc::new(Mutex::new(file)));
        debug!(request_id, path, ?mode, "opened");
    }

    async fn handle(&self, request_id: &str) -> Result<Arc<Mutex<OpenFile>>> {
        self.handles
            .lock()
            .await
            .get(request_id)
            .cloned()
            .ok_or_else(|| FsError::UnknownHandle(request_id.to_string()))
    }

    pub async fn read(&self, request_id: &str, offset: u64, length: u64) -> Result<ReadResult> {
        let path = self.handle(request_id).await?.lock().await.path.clone();
        self.client.read_file(&path, offset, length).await
    }

    /// Writes on one handle are serialized by the handle's own lock.
    pub async fn write(&self, request_id: &str, data: &[u8], offset: u64) -> Result<()> {
        let handle = self.handle(request_id).await?;
        let mut file = handle.lock().await;
        self.client.write_file(&mut file, data, offset).await
    }

    /// Close a handle, committing any upload session. The handle is gone
    /// afterwards whether or not the commit succeeded.
    pub async fn close(&self, request_id: &str) -> Result<()> {
        let handle = self
            .handles
            .lock()
            .await
            .remove(request_id)
            .ok_or_else(|| FsError::UnknownHandle(request_id.to_string()))?;
        let mut file = handle.lock().await;
        if self.client.close_file(&mut file).await? {
            self.invalidate(&file.path).await;
        }
        Ok(())
    }

    pub async fn open_handles(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub async fn create_directory(&self, path: &str) -> Result<()> {
        self.client.create_directory(path).await?;
        self.invalidate(path).await;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.client.delete_entry(path).await?;
        self.invalidate(path).await;
        Ok(())
    }

    pub async fn move_entry(&self, source: &str, target: &str) -> Result<()> {
        self.client.move_entry(source, target).await?;
        self.invalidate(source).await;
        self.invalidate(target).await;
        Ok(())
    }

    pub async fn copy_entry(&self, source: &str, target: &str) -> Result<()> {
        self.client.copy_entry(source, target).await?;
        self.invalidate(source).await;
        self.invalidate(target).await;
        Ok(())
    }

    pub async fn create_file(&self, path: &str) -> Result<()> {
        self.client.create_file(path).await?;
        self.invalidate(path).await;
        Ok(())
    }

    /// Last committer wins against write handles open on the same path.
    pub async fn truncate(&self, path: &str, length: u64) -> Result<()> {
        self.client.truncate(path, length).await?;
        self.invalidate(path).await;
        Ok(())
    }

    pub async fn invalidate(&self, path: &str) {
        self.cache.lock().await.remove(path);
    }

    /// Start watching `path`, seeding its listing so the first poll has a
    /// baseline to compare against.
    pub async fn add_watcher(&self, path: &str) -> Result<()> {
        let cached = self.cache.lock().await.dir(path).is_some();
        if !cached {
            self.list(path).await?;
        }
        self.watchers.lock().await.insert(path.to_string());
        Ok(())
    }

    /// Returns whether `path` was watched.
    pub async fn remove_watcher(&self, path: &str) -> bool {
        self.watchers.lock().await.remove(path)
    }

    pub async fn watched(&self) -> Vec<String> {
        self.watchers.lock().await.iter().cloned().collect()
    }
}
