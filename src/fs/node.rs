//! Filesystem entry types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::types::{EntryTag, RemoteEntry};

const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "gif", "bmp"];

/// Immutable snapshot of one remote entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Full path (e.g. "/Docs/a.txt"); "/" for the root
    pub path: String,
    /// Final path component; empty for the root
    pub name: String,
    pub is_directory: bool,
    /// File size in bytes (0 for folders)
    pub size: u64,
    /// Server modification time; folders carry none
    pub modification_time: Option<DateTime<Utc>>,
    pub mime_type: Option<String>,
    /// `data:` URL, only when requested and eligible
    pub thumbnail: Option<String>,
}

impl EntryMetadata {
    /// The synthesized root directory.
    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
            name: String::new(),
            is_directory: true,
            size: 0,
            modification_time: None,
            mime_type: None,
            thumbnail: None,
        }
    }

    /// Convert a remote entry found at `path`.
    pub fn from_remote(path: String, entry: &RemoteEntry) -> Self {
        let is_directory = entry.tag == EntryTag::Folder;
        let mime_type = if is_directory {
            None
        } else {
            mime_type_for(&entry.name).map(str::to_string)
        };

        Self {
            path,
            name: entry.name.clone(),
            is_directory,
            size: entry.size.unwrap_or(0),
            modification_time: entry.server_modified,
            mime_type,
            thumbnail: None,
        }
    }

    /// Whether a thumbnail may be requested for this entry.
    pub fn is_thumbnail_candidate(&self, size_limit: u64) -> bool {
        !self.is_directory && self.size < size_limit && has_image_extension(&self.name)
    }

    /// Keep only the requested fields.
    pub fn trim(&self, fields: &MetadataFields) -> PartialEntry {
        PartialEntry {
            is_directory: fields.is_directory.then_some(self.is_directory),
            name: fields.name.then(|| self.name.clone()),
            size: fields.size.then_some(self.size),
            modification_time: if fields.modification_time {
                self.modification_time
            } else {
                None
            },
            mime_type: if fields.mime_type {
                self.mime_type.clone()
            } else {
                None
            },
            thumbnail: if fields.thumbnail {
                self.thumbnail.clone()
            } else {
                None
            },
        }
    }
}

/// Which metadata fields the host asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataFields {
    pub is_directory: bool,
    pub name: bool,
    pub size: bool,
    pub modification_time: bool,
    pub mime_type: bool,
    pub thumbnail: bool,
}

impl MetadataFields {
    /// Every field except the thumbnail.
    pub fn all() -> Self {
        Self {
            is_directory: true,
            name: true,
            size: true,
            modification_time: true,
            mime_type: true,
            thumbnail: false,
        }
    }

    pub fn with_thumbnail(mut self) -> Self {
        self.thumbnail = true;
        self
    }
}

/// Metadata reduced to the requested fields; absent fields are never defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn has_image_extension(name: &str) -> bool {
    extension(name).is_some_and(|ext| THUMBNAIL_EXTENSIONS.contains(&ext.as_str()))
}

/// Best-effort mime type from a file name.
pub fn mime_type_for(name: &str) -> Option<&'static str> {
    let mime = match extension(name)?.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(tag: EntryTag, name: &str, size: Option<u64>) -> RemoteEntry {
        RemoteEntry {
            tag,
            name: name.to_string(),
            path_display: None,
            size,
            server_modified: None,
        }
    }

    #[test]
    fn test_from_remote() {
        let file = EntryMetadata::from_remote(
            "/a/photo.JPG".to_string(),
            &remote(EntryTag::File, "photo.JPG", Some(10)),
        );
        assert!(!file.is_directory);
        assert_eq!(file.size, 10);
        assert_eq!(file.mime_type.as_deref(), Some("image/jpeg"));

        let folder =
            EntryMetadata::from_remote("/a".to_string(), &remote(EntryTag::Folder, "a", None));
        assert!(folder.is_directory);
        assert_eq!(folder.size, 0);
        assert!(folder.mime_type.is_none());
        assert!(folder.modification_time.is_none());
    }

    #[test]
    fn test_thumbnail_candidates() {
        let limit = 20 * 1024 * 1024;
        let entry = |name: &str, size: u64| {
            EntryMetadata::from_remote(
                format!("/{}", name),
                &remote(EntryTag::File, name, Some(size)),
            )
        };
        assert!(entry("a.png", 100).is_thumbnail_candidate(limit));
        assert!(entry("a.TIFF", 100).is_thumbnail_candidate(limit));
        assert!(!entry("a.png", limit).is_thumbnail_candidate(limit));
        assert!(!entry("a.txt", 100).is_thumbnail_candidate(limit));
        assert!(!entry(".png", 100).is_thumbnail_candidate(limit));
        assert!(!EntryMetadata::root().is_thumbnail_candidate(limit));
    }

    #[test]
    fn test_trim_only_requested_fields() {
        let mut entry = EntryMetadata::from_remote(
            "/a.png".to_string(),
            &remote(EntryTag::File, "a.png", Some(5)),
        );
        entry.thumbnail = Some("data:image/jpeg;base64,AA==".to_string());

        let trimmed = entry.trim(&MetadataFields {
            name: true,
            size: true,
            ..MetadataFields::default()
        });
        assert_eq!(trimmed.name.as_deref(), Some("a.png"));
        assert_eq!(trimmed.size, Some(5));
        assert!(trimmed.is_directory.is_none());
        assert!(trimmed.thumbnail.is_none());

        let json = serde_json::to_value(&trimmed).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 2);

        let with_thumb = entry.trim(&MetadataFields::all().with_thumbnail());
        assert!(with_thumb.thumbnail.is_some());
        assert_eq!(with_thumb.is_directory, Some(false));
    }

    #[test]
    fn test_trim_does_not_fabricate() {
        let trimmed = EntryMetadata::root().trim(&MetadataFields::all().with_thumbnail());
        assert!(trimmed.modification_time.is_none());
        assert!(trimmed.thumbnail.is_none());
        assert_eq!(trimmed.size, Some(0));
    }
}
