//! The host filesystem-provider transport, seen from the adapter.
//!
//! The host delivers typed requests and expects one reply per request; it
//! also owns the list of mounted file systems and accepts change
//! notifications for watched directories.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Options passed to the host when registering a mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountOptions {
    pub file_system_id: String,
    pub display_name: String,
    pub writable: bool,
    pub opened_files_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Changed,
    Deleted,
}

/// One changed child of an observed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryChange {
    /// Entry name within the observed directory.
    pub entry_path: String,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    pub file_system_id: String,
    pub observed_path: String,
    pub recursive: bool,
    pub change_type: ChangeType,
    pub changes: Vec<EntryChange>,
}

#[async_trait]
pub trait ProviderHost: Send + Sync {
    async fn mount(&self, options: MountOptions) -> Result<()>;
    async fn unmount(&self, file_system_id: &str) -> Result<()>;
    /// Ids of every file system the host currently has mounted.
    async fn mounted_file_systems(&self) -> Result<Vec<String>>;
    async fn notify(&self, notification: ChangeNotification) -> Result<()>;
}

/// Runs the interactive authorization flow and yields an access token.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<String>;
}
