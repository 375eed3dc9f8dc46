//! # dropfs
//!
//! Dropbox-backed file system provider for hosts that mount remote storage
//! through a request/reply provider interface.
//!
//! ## Features
//!
//! - **Mounting**: Authorize an account, register it with the host and
//!   persist the token so the mount survives restarts.
//!   - Cold sessions are resumed on demand from the stored credential.
//!   - A rejected token unmounts the tenant automatically.
//! - **Filesystem Operations**:
//!   - List directories and stat entries, with a per-tenant metadata cache.
//!   - Create, delete, move and copy files and folders.
//!   - Optional JPEG thumbnails for image files, returned as `data:` URLs.
//! - **File Transfers**:
//!   - Ranged reads.
//!   - Chunked writes through upload sessions, committed on close.
//!   - Truncate by download and re-upload.
//! - **Change Detection**:
//!   - Polling watchers that diff directory listings and notify the host.
//!
//! ## Example: Mount and List
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dropfs::auth::StaticTokenAuthorizer;
//! use dropfs::fs::MetadataFields;
//! use dropfs::{Config, MemoryStore, ProviderHost, Registry, ReqwestTransport};
//!
//! # async fn example(host: Arc<dyn ProviderHost>) -> dropfs::Result<()> {
//! let config = Config::default();
//! let registry = Registry::new(
//!     config.clone(),
//!     Arc::new(ReqwestTransport::new(config.request_timeout)?),
//!     Arc::new(MemoryStore::new()),
//!     host,
//!     Arc::new(StaticTokenAuthorizer::new("access-token")),
//! );
//!
//! let tenant = registry.mount().await?;
//! for entry in registry.list(&tenant, "/", &MetadataFields::all()).await? {
//!     println!("{:?} ({:?} bytes)", entry.name, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod base64;
pub mod config;
pub mod error;
pub mod fs;
pub mod host;
pub mod http;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::ErrorCode;
pub use auth::StaticTokenAuthorizer;
pub use config::{Config, Settings, ThumbnailPolicy};
pub use error::{FsError, Result};
pub use fs::{EntryMetadata, MetadataFields, OpenMode, PartialEntry, ReadResult};
pub use host::{Authorizer, ChangeNotification, ChangeType, EntryChange, MountOptions, ProviderHost};
pub use http::{HttpTransport, ReqwestTransport};
pub use session::{ChangePoller, Lifecycle, Registry, Session};
pub use store::{CredentialStore, JsonFileStore, KeyValueStore, MemoryStore};
