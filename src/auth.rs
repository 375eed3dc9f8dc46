//! OAuth2 implicit-grant helpers.
//!
//! The interactive part (opening a browser or web view and capturing the
//! redirect) belongs to the embedder; it hands the redirect URL to
//! [`token_from_redirect_url`].

use async_trait::async_trait;
use url::Url;

use crate::error::{FsError, Result};
use crate::host::Authorizer;

const AUTHORIZE_URL: &str = "https://www.dropbox.com/oauth2/authorize";

/// Build the authorize URL for the token flow.
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<Url> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("response_type", "token"),
            ("client_id", client_id),
            ("force_reapprove", "true"),
            ("redirect_uri", redirect_uri),
        ],
    )
    .map_err(|e| FsError::Authorization(format!("Invalid authorize URL: {}", e)))
}

/// Extract `access_token` from the fragment of a redirect URL.
pub fn token_from_redirect_url(redirect_url: &str) -> Result<String> {
    if redirect_url.is_empty() {
        return Err(FsError::Authorization("Authorization failed".to_string()));
    }
    let url = Url::parse(redirect_url)
        .map_err(|e| FsError::Authorization(format!("Invalid redirect URL: {}", e)))?;
    let fragment = url.fragment().unwrap_or("");

    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(k, _)| k == "access_token")
        .map(|(_, v)| v.into_owned())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            FsError::Authorization("Access token not found in redirect URL".to_string())
        })
}

/// Authorizer that hands out a pre-issued token.
#[derive(Debug, Clone)]
pub struct StaticTokenAuthorizer {
    token: String,
}

impl StaticTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn authorize(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(FsError::Authorization("Empty access token".to_string()));
        }
        Ok(self.token.clone())
    }
}
