//! Filesystem objects and the remote adapter.

pub mod cache;
pub mod client;
pub(crate) mod node;
mod operations;
pub mod upload_state;

pub use cache::{Lookup, MetadataCache};
pub use client::{Client, ReadResult};
pub use node::{EntryMetadata, MetadataFields, PartialEntry, mime_type_for};
pub(crate) use operations::{join_path, normalize_path, split_parent};
pub use upload_state::{HandleState, OpenFile, OpenMode, UploadSession};
