//! Dropbox API client, request executor and payload types.

pub mod client;
pub mod error;
pub mod executor;
pub mod types;

pub use client::ApiClient;
pub use error::ErrorCode;
pub use executor::Executor;
pub use types::{UserInfo, WriteMode};
