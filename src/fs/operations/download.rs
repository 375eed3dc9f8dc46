//! Ranged file reads.

use tracing::debug;

use crate::error::Result;
use crate::fs::client::{Client, ReadResult};

impl Client {
    /// Read `length` bytes at `offset`. Reading past the end yields an
    /// empty result rather than an error.
    pub async fn read_file(&self, path: &str, offset: u64, length: u64) -> Result<ReadResult> {
        if length == 0 {
            return Ok(ReadResult {
                data: Vec::new(),
                has_more: false,
            });
        }

        let data = self.api.download(path, offset, Some(length)).await?;
        debug!(path, offset, requested = length, received = data.len(), "read");
        Ok(ReadResult {
            data,
            has_more: false,
        })
    }
}
