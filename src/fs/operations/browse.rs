//! Metadata and directory listing.

use tracing::{debug, warn};

use super::utils::join_path;
use crate::api::types::EntryTag;
use crate::base64::data_url;
use crate::config::ThumbnailPolicy;
use crate::error::{FsError, Result};
use crate::fs::client::Client;
use crate::fs::node::EntryMetadata;

impl Client {
    /// Get information about a file or folder.
    ///
    /// The root is answered locally. A thumbnail is fetched only when
    /// `want_thumbnail` is set and the entry is an eligible image; how a
    /// thumbnail failure is handled depends on the thumbnail policy.
    pub async fn get_metadata(&self, path: &str, want_thumbnail: bool) -> Result<EntryMetadata> {
        if path == "/" {
            return Ok(EntryMetadata::root());
        }

        let entry = self.api.get_metadata(path).await?;
        let mut metadata = EntryMetadata::from_remote(path.to_string(), &entry);

        if want_thumbnail && metadata.is_thumbnail_candidate(self.thumbnail_size_limit) {
            match self.api.get_thumbnail(path).await {
                Ok(bytes) => metadata.thumbnail = Some(data_url("image/jpeg", &bytes)),
                Err(FsError::AccessTokenExpired) => return Err(FsError::AccessTokenExpired),
                Err(e) => match self.thumbnail_policy {
                    ThumbnailPolicy::Required => return Err(e),
                    ThumbnailPolicy::BestEffort => {
                        warn!(path, error = %e, "thumbnail unavailable, returning metadata only");
                    }
                },
            }
        }

        Ok(metadata)
    }

    /// List a directory, following continuation cursors until the remote
    /// reports no more pages.
    pub async fn read_directory(&self, path: &str) -> Result<Vec<EntryMetadata>> {
        let mut page = self.api.list_folder(path).await?;
        let mut entries = Vec::new();
        let mut pages = 1;

        loop {
            entries.extend(
                page.entries
                    .iter()
                    .filter(|e| matches!(e.tag, EntryTag::File | EntryTag::Folder))
                    .map(|e| EntryMetadata::from_remote(join_path(path, &e.name), e)),
            );
            if !page.has_more {
                break;
            }
            let cursor = page.cursor.take().ok_or_else(|| {
                FsError::InvalidResponse("listing has more pages but no cursor".to_string())
            })?;
            page = self.api.list_folder_continue(&cursor).await?;
            pages += 1;
        }

        debug!(path, pages, entries = entries.len(), "directory listed");
        Ok(entries)
    }
}
