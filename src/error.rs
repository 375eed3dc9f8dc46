//! Error types for the dropfs library.

use thiserror::Error;

use crate::api::ErrorCode;

/// Main error type for dropfs operations.
#[derive(Error, Debug)]
pub enum FsError {
    /// Remote entry (or cached listing entry) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote rejected the access token (HTTP 401).
    #[error("Access token expired or revoked")]
    AccessTokenExpired,

    /// HTTP request failed with a status code that is not retried.
    #[error("HTTP error in {caller}: {status}")]
    HttpError { caller: &'static str, status: u16 },

    /// HTTP 429 without a usable `Retry-After` header.
    #[error("Rate limited in {caller} without Retry-After")]
    RateLimited { caller: &'static str },

    /// Network request error (no HTTP status was received).
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Local I/O error (file-backed store).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unexpected response from server.
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// A write broke the contiguous-offset contract of its handle.
    #[error("Upload protocol violation: {0}")]
    ProtocolViolation(String),

    /// The handle was poisoned by an earlier failed append or commit.
    #[error("Handle {0} is in a failed state")]
    HandleFailed(String),

    /// No open handle with this request id.
    #[error("Unknown open request id: {0}")]
    UnknownHandle(String),

    /// A mount already exists for this tenant.
    #[error("Already mounted: {0}")]
    AlreadyMounted(String),

    /// Resume found no persisted credential for the tenant.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// Resume failed for a caller-triggered operation; credential purged.
    #[error("Resume failed for {tenant}: {reason}")]
    ResumeFailed { tenant: String, reason: String },

    /// Authorization flow failed.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Host transport rejected a call.
    #[error("Host error: {0}")]
    Host(String),

    /// Custom error message.
    #[error("{0}")]
    Custom(String),
}

impl FsError {
    /// Map to the error taxonomy the host transport understands.
    pub fn code(&self) -> ErrorCode {
        match self {
            FsError::NotFound(_) => ErrorCode::NotFound,
            FsError::AccessTokenExpired => ErrorCode::InvalidOperation,
            FsError::AlreadyMounted(_) => ErrorCode::AlreadyMounted,
            FsError::CredentialNotFound(_) => ErrorCode::CredentialNotFound,
            _ => ErrorCode::Failed,
        }
    }

    /// True when the request never produced an HTTP status (status 0).
    pub fn is_transport(&self) -> bool {
        match self {
            FsError::RequestError(e) => e.status().is_none(),
            FsError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for dropfs operations.
pub type Result<T> = std::result::Result<T, FsError>;
