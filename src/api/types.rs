//! Dropbox API v2 payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryTag {
    File,
    Folder,
    Deleted,
    #[serde(other)]
    Unknown,
}

/// A file, folder or deletion marker as returned by metadata and listing calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    #[serde(rename = ".tag")]
    pub tag: EntryTag,
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub server_modified: Option<DateTime<Utc>>,
}

/// One page of a folder listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListFolderPage {
    pub entries: Vec<RemoteEntry>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountName {
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentAccount {
    pub account_id: String,
    pub name: AccountName,
}

/// Authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: String,
    pub display_name: String,
}

impl From<CurrentAccount> for UserInfo {
    fn from(account: CurrentAccount) -> Self {
        Self {
            uid: account.account_id,
            display_name: account.name.display_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSessionStart {
    pub session_id: String,
}

/// Conflict behavior for a committed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail if a file already exists at the path.
    Add,
    /// Replace any existing file (last write wins).
    Overwrite,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Add => "add",
            WriteMode::Overwrite => "overwrite",
        }
    }
}
