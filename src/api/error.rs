//! Provider error taxonomy.

/// Error codes reported to the host filesystem-provider transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Remote 404/409, or a cached-negative lookup
    NotFound,
    /// Credential expired; the tenant was unmounted
    InvalidOperation,
    /// Uncategorized remote or transport failure
    Failed,
    /// Tenant already has a live mount
    AlreadyMounted,
    /// Resume without a stored credential
    CredentialNotFound,
}

impl ErrorCode {
    /// Wire name used by the host transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
            ErrorCode::Failed => "FAILED",
            ErrorCode::AlreadyMounted => "ALREADY_MOUNTED",
            ErrorCode::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
        }
    }

    /// Get human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "Entry not found",
            ErrorCode::InvalidOperation => "Access token expired, file system unmounted",
            ErrorCode::Failed => "Operation failed",
            ErrorCode::AlreadyMounted => "Account already mounted",
            ErrorCode::CredentialNotFound => "No stored credential for this file system",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
