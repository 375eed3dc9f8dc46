//! Single-call mutations: create, delete, move, copy.

use tracing::debug;

use crate::api::types::WriteMode;
use crate::error::Result;
use crate::fs::client::Client;

impl Client {
    pub async fn create_directory(&self, path: &str) -> Result<()> {
        self.api.create_folder(path).await?;
        debug!(path, "directory created");
        Ok(())
    }

    /// Delete a file or a folder with everything below it.
    pub async fn delete_entry(&self, path: &str) -> Result<()> {
        self.api.delete(path).await?;
        debug!(path, "deleted");
        Ok(())
    }

    pub async fn move_entry(&self, source: &str, target: &str) -> Result<()> {
        self.api.move_entry(source, target).await?;
        debug!(source, target, "moved");
        Ok(())
    }

    pub async fn copy_entry(&self, source: &str, target: &str) -> Result<()> {
        self.api.copy_entry(source, target).await?;
        debug!(source, target, "copied");
        Ok(())
    }

    /// Create an empty file; fails if something already exists at `path`.
    pub async fn create_file(&self, path: &str) -> Result<()> {
        self.api.upload(path, Vec::new(), WriteMode::Add).await?;
        debug!(path, "file created");
        Ok(())
    }
}
