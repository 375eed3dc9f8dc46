//! Dropbox API client: one method per remote call.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::executor::Executor;
use super::types::{
    CurrentAccount, EntryTag, ListFolderPage, RemoteEntry, UploadSessionStart, UserInfo, WriteMode,
};
use crate::config::Config;
use crate::error::{FsError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

/// Authenticated Dropbox API client.
#[derive(Clone)]
pub struct ApiClient {
    executor: Executor,
    access_token: String,
    api_url: String,
    content_url: String,
    thumbnail_size: String,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, access_token: String, config: &Config) -> Self {
        Self {
            executor: Executor::new(transport, config.transport_retry_delay),
            access_token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
            thumbnail_size: config.thumbnail_size.clone(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// RPC-style call: JSON arguments in the body.
    async fn rpc(&self, caller: &'static str, endpoint: &str, args: Value) -> Result<HttpResponse> {
        let request = HttpRequest::post(caller, format!("{}/{}", self.api_url, endpoint))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json; charset=utf-8")
            .body(serde_json::to_vec(&args)?);
        self.executor.execute(&request).await
    }

    /// Content-style call: JSON arguments in the `Dropbox-API-Arg` header.
    async fn content(
        &self,
        caller: &'static str,
        endpoint: &str,
        arg: Value,
        body: Vec<u8>,
        range: Option<String>,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::post(caller, format!("{}/{}", self.content_url, endpoint))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Dropbox-API-Arg", api_arg(&arg)?)
            .header("Content-Type", "application/octet-stream")
            .body(body);
        if let Some(range) = range {
            request = request.header("Range", range);
        }
        self.executor.execute(&request).await
    }

    pub async fn get_current_user(&self) -> Result<UserInfo> {
        let response = self
            .rpc("getUserInfo", "users/get_current_account", Value::Null)
            .await?;
        let account: CurrentAccount = parse(&response)?;
        Ok(account.into())
    }

    pub async fn revoke(&self) -> Result<()> {
        self.rpc("revoke", "auth/token/revoke", Value::Null).await?;
        Ok(())
    }

    /// Metadata for one path; deleted entries are `NotFound`.
    pub async fn get_metadata(&self, path: &str) -> Result<RemoteEntry> {
        let response = self
            .rpc(
                "getMetadata",
                "files/get_metadata",
                json!({ "path": path, "include_deleted": false }),
            )
            .await
            .map_err(missing(path))?;
        let entry: RemoteEntry = parse(&response)?;
        if entry.tag == EntryTag::Deleted {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(entry)
    }

    /// First page of a listing. The root is addressed as "".
    pub async fn list_folder(&self, path: &str) -> Result<ListFolderPage> {
        let remote_path = if path == "/" { "" } else { path };
        let response = self
            .rpc(
                "readDirectory",
                "files/list_folder",
                json!({ "path": remote_path, "recursive": false, "include_deleted": false }),
            )
            .await
            .map_err(missing(path))?;
        parse(&response)
    }

    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage> {
        let response = self
            .rpc(
                "continueReadDirectory",
                "files/list_folder/continue",
                json!({ "cursor": cursor }),
            )
            .await?;
        parse(&response)
    }

    /// Ranged download of `length` bytes at `offset`; `None` reads to EOF.
    pub async fn download(&self, path: &str, offset: u64, length: Option<u64>) -> Result<Vec<u8>> {
        let range = match length {
            Some(0) => return Ok(Vec::new()),
            // A range ending past u64::MAX is the same as reading to EOF.
            Some(length) => match offset.checked_add(length - 1) {
                Some(last) => format!("bytes={}-{}", offset, last),
                None => format!("bytes={}-", offset),
            },
            None => format!("bytes={}-", offset),
        };
        let response = self
            .content(
                "readFile",
                "files/download",
                json!({ "path": path }),
                Vec::new(),
                Some(range),
            )
            .await
            .map_err(missing(path))?;
        Ok(response.body)
    }

    /// Single-request upload of a whole file.
    pub async fn upload(&self, path: &str, data: Vec<u8>, mode: WriteMode) -> Result<()> {
        self.content(
            "upload",
            "files/upload",
            json!({ "path": path, "mode": mode.as_str() }),
            data,
            None,
        )
        .await
        .map_err(missing(path))?;
        Ok(())
    }

    pub async fn upload_session_start(&self) -> Result<String> {
        let response = self
            .content(
                "startUploadSession",
                "files/upload_session/start",
                json!({ "close": false }),
                Vec::new(),
                None,
            )
            .await?;
        let start: UploadSessionStart = parse(&response)?;
        Ok(start.session_id)
    }

    pub async fn upload_session_append(
        &self,
        session_id: &str,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<()> {
        self.content(
            "appendUploadSession",
            "files/upload_session/append_v2",
            json!({
                "cursor": { "session_id": session_id, "offset": offset },
                "close": false
            }),
            data,
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn upload_session_finish(
        &self,
        session_id: &str,
        offset: u64,
        path: &str,
        mode: WriteMode,
    ) -> Result<()> {
        self.content(
            "finishUploadSession",
            "files/upload_session/finish",
            json!({
                "cursor": { "session_id": session_id, "offset": offset },
                "commit": { "path": path, "mode": mode.as_str() }
            }),
            Vec::new(),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn create_folder(&self, path: &str) -> Result<()> {
        self.rpc("createDirectory", "files/create_folder_v2", json!({ "path": path }))
            .await
            .map_err(missing(path))?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.rpc("deleteEntry", "files/delete_v2", json!({ "path": path }))
            .await
            .map_err(missing(path))?;
        Ok(())
    }

    pub async fn move_entry(&self, from: &str, to: &str) -> Result<()> {
        self.rpc(
            "moveEntry",
            "files/move_v2",
            json!({ "from_path": from, "to_path": to }),
        )
        .await
        .map_err(missing(from))?;
        Ok(())
    }

    pub async fn copy_entry(&self, from: &str, to: &str) -> Result<()> {
        self.rpc(
            "copyEntry",
            "files/copy_v2",
            json!({ "from_path": from, "to_path": to }),
        )
        .await
        .map_err(missing(from))?;
        Ok(())
    }

    /// JPEG thumbnail bytes.
    pub async fn get_thumbnail(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .content(
                "getThumbnail",
                "files/get_thumbnail",
                json!({ "path": path, "format": "jpeg", "size": self.thumbnail_size }),
                Vec::new(),
                None,
            )
            .await
            .map_err(missing(path))?;
        Ok(response.body)
    }
}

/// Name the missing entry rather than the operation that missed it.
fn missing(path: &str) -> impl FnOnce(FsError) -> FsError + '_ {
    move |e| match e {
        FsError::NotFound(_) => FsError::NotFound(path.to_string()),
        other => other,
    }
}

fn parse<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        FsError::InvalidResponse(format!("{} ({})", e, response.body_string()))
    })
}

/// Serialize a `Dropbox-API-Arg` header value. HTTP headers must be ASCII, so
/// every non-ASCII code point is written as a JSON `\uXXXX` escape.
pub fn api_arg(arg: &Value) -> Result<String> {
    let json = serde_json::to_string(arg)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}
