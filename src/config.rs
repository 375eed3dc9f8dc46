//! Static configuration and persisted user settings.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Dropbox RPC endpoint base (JSON bodies).
pub const API_URL: &str = "https://api.dropboxapi.com/2";
/// Dropbox content endpoint base (`Dropbox-API-Arg` header, binary bodies).
pub const CONTENT_URL: &str = "https://content.dropboxapi.com/2";
/// Maximum bytes sent per upload-session append.
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;
/// Files at or above this size never get a thumbnail.
pub const THUMBNAIL_SIZE_LIMIT: u64 = 20 * 1024 * 1024;

/// Static, code-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub content_url: String,
    pub chunk_size: usize,
    /// Change poller period.
    pub poll_interval: Duration,
    /// Delay before re-issuing a request that got no HTTP status.
    pub transport_retry_delay: Duration,
    pub request_timeout: Duration,
    pub thumbnail_size_limit: u64,
    pub thumbnail_size: String,
    /// Prefix for tenant ids, e.g. `dropboxfs://<account_id>`.
    pub file_system_scheme: String,
    pub display_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            content_url: CONTENT_URL.to_string(),
            chunk_size: CHUNK_SIZE,
            poll_interval: Duration::from_secs(60),
            transport_retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
            thumbnail_size_limit: THUMBNAIL_SIZE_LIMIT,
            thumbnail_size: "w128h128".to_string(),
            file_system_scheme: "dropboxfs".to_string(),
            display_name_prefix: "Dropbox".to_string(),
        }
    }
}

/// What to do when an eligible thumbnail cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThumbnailPolicy {
    /// Thumbnail errors fail the whole stat.
    #[default]
    Required,
    /// Thumbnail errors are logged and the entry is returned without one.
    BestEffort,
}

/// User settings, persisted under the `settings` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(deserialize_with = "number_or_string")]
    pub opened_files_limit: u32,
    #[serde(alias = "useWatcher")]
    pub use_watcher_polling: bool,
    pub thumbnail_policy: ThumbnailPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opened_files_limit: 10,
            use_watcher_polling: false,
            thumbnail_policy: ThumbnailPolicy::Required,
        }
    }
}

// Older records stored the limit as a string ("10").
fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
