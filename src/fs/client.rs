//! The per-tenant remote filesystem adapter.

use crate::api::ApiClient;
use crate::config::{Config, Settings, ThumbnailPolicy};

/// Translates filesystem operations into Dropbox API calls.
///
/// Stateless apart from configuration; handle state lives in
/// [`OpenFile`](super::OpenFile) values owned by the caller.
pub struct Client {
    pub(crate) api: ApiClient,
    uid: String,
    pub(crate) chunk_size: usize,
    pub(crate) thumbnail_size_limit: u64,
    pub(crate) thumbnail_policy: ThumbnailPolicy,
}

impl Client {
    pub fn new(api: ApiClient, uid: String, config: &Config, settings: &Settings) -> Self {
        Self {
            api,
            uid,
            chunk_size: config.chunk_size.max(1),
            thumbnail_size_limit: config.thumbnail_size_limit,
            thumbnail_policy: settings.thumbnail_policy,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

/// Result of a read: bytes plus whether the host should ask again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub data: Vec<u8>,
    pub has_more: bool,
}
