//! Test doubles: a scripted transport, an in-memory Dropbox and a recording host.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::error::{FsError, Result};
use crate::host::{Authorizer, ChangeNotification, MountOptions, ProviderHost};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// Transport answering from a closure and recording every request.
pub(crate) struct MockTransport {
    handler: Handler,
    log: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn times(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    /// Requests whose endpoint (the part after `/2/`) equals `name`.
    pub(crate) fn requests_to(&self, name: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| endpoint(r) == name)
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.log
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        // Let concurrent operations interleave at every remote call.
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

pub(crate) fn endpoint(request: &HttpRequest) -> &str {
    request
        .url
        .split_once("/2/")
        .map(|(_, e)| e)
        .unwrap_or(&request.url)
}

pub(crate) fn json_response(value: Value) -> HttpResponse {
    HttpResponse::new(200, value.to_string())
}

/// Parsed `Dropbox-API-Arg` header.
pub(crate) fn api_arg_of(request: &HttpRequest) -> Value {
    request
        .header_value("Dropbox-API-Arg")
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or(Value::Null)
}

/// Parsed JSON body.
pub(crate) fn json_body(request: &HttpRequest) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

pub(crate) const ACCOUNT_ID: &str = "dbid:test";
pub(crate) const DISPLAY_NAME: &str = "Test User";

struct FakeFile {
    data: Vec<u8>,
    modified: i64,
}

#[derive(Default)]
struct FakeState {
    files: BTreeMap<String, FakeFile>,
    folders: BTreeSet<String>,
    sessions: HashMap<String, Vec<u8>>,
    next_session: u64,
    clock: i64,
    page_size: Option<usize>,
    expired: bool,
    failures: HashMap<String, u16>,
}

/// In-memory Dropbox speaking enough of API v2 for the adapter.
pub(crate) struct FakeDropbox {
    account_id: String,
    display_name: String,
    state: Mutex<FakeState>,
}

impl FakeDropbox {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_account(ACCOUNT_ID, DISPLAY_NAME)
    }

    pub(crate) fn with_account(account_id: &str, display_name: &str) -> Arc<Self> {
        Arc::new(Self {
            account_id: account_id.to_string(),
            display_name: display_name.to_string(),
            state: Mutex::new(FakeState::default()),
        })
    }

    pub(crate) fn transport(self: &Arc<Self>) -> Arc<MockTransport> {
        let fake = self.clone();
        MockTransport::new(move |req| Ok(fake.handle(req)))
    }

    pub(crate) fn add_file(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.state.lock().unwrap().store(path, data.into());
    }

    pub(crate) fn add_folder(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.ensure_parents(path);
        state.folders.insert(path.to_string());
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|f| f.data.clone())
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.folders.contains(path)
    }

    pub(crate) fn remove(&self, path: &str) {
        self.state.lock().unwrap().remove_tree(path);
    }

    /// Limit listing pages to `size` entries.
    pub(crate) fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    /// Every subsequent request gets 401.
    pub(crate) fn expire_token(&self) {
        self.state.lock().unwrap().expired = true;
    }

    /// Answer every request to `endpoint` with `status`.
    pub(crate) fn fail(&self, endpoint: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(endpoint.to_string(), status);
    }

    pub(crate) fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let mut state = self.state.lock().unwrap();
        if state.expired {
            return error_response(401, "expired_access_token/");
        }
        let name = endpoint(request).to_string();
        if let Some(status) = state.failures.get(&name) {
            return error_response(*status, "injected/");
        }

        let arg = match request.header_value("Dropbox-API-Arg") {
            Some(_) => api_arg_of(request),
            None => json_body(request),
        };
        let path = |key: &str| arg[key].as_str().unwrap_or_default().to_string();

        match name.as_str() {
            "users/get_current_account" => json_response(json!({
                "account_id": self.account_id,
                "name": { "given_name": "Test", "display_name": self.display_name }
            })),
            "auth/token/revoke" => json_response(Value::Null),
            "files/get_metadata" => match state.entry_json(&path("path")) {
                Some(entry) => json_response(entry),
                None => not_found(),
            },
            "files/list_folder" => state.list(&path("path"), 0),
            "files/list_folder/continue" => {
                let cursor = path("cursor");
                match cursor.rsplit_once('|') {
                    Some((dir, offset)) => state.list(dir, offset.parse().unwrap_or(0)),
                    None => error_response(400, "bad_cursor/"),
                }
            }
            "files/download" => state.download(&path("path"), request.header_value("Range")),
            "files/upload" => {
                let target = path("path");
                if arg["mode"] == "add" && state.files.contains_key(&target) {
                    return error_response(409, "path/conflict/file/");
                }
                state.store(&target, request.body.clone());
                json_response(state.entry_json(&target).unwrap_or(Value::Null))
            }
            "files/upload_session/start" => {
                state.next_session += 1;
                let id = format!("sess-{}", state.next_session);
                state.sessions.insert(id.clone(), request.body.clone());
                json_response(json!({ "session_id": id }))
            }
            "files/upload_session/append_v2" => {
                match state.session_at(&arg["cursor"]) {
                    Ok(id) => {
                        if let Some(buf) = state.sessions.get_mut(&id) {
                            buf.extend_from_slice(&request.body);
                        }
                        json_response(Value::Null)
                    }
                    Err(response) => response,
                }
            }
            "files/upload_session/finish" => match state.session_at(&arg["cursor"]) {
                Ok(id) => {
                    let target = arg["commit"]["path"].as_str().unwrap_or_default().to_string();
                    let mut data = state.sessions.remove(&id).unwrap_or_default();
                    data.extend_from_slice(&request.body);
                    state.store(&target, data);
                    json_response(state.entry_json(&target).unwrap_or(Value::Null))
                }
                Err(response) => response,
            },
            "files/create_folder_v2" => {
                let target = path("path");
                if state.entry_json(&target).is_some() {
                    return error_response(409, "path/conflict/folder/");
                }
                state.ensure_parents(&target);
                state.folders.insert(target.clone());
                json_response(json!({ "metadata": state.entry_json(&target) }))
            }
            "files/delete_v2" => {
                let target = path("path");
                match state.entry_json(&target) {
                    Some(entry) => {
                        state.remove_tree(&target);
                        json_response(json!({ "metadata": entry }))
                    }
                    None => not_found(),
                }
            }
            "files/move_v2" | "files/copy_v2" => {
                let (from, to) = (path("from_path"), path("to_path"));
                if state.entry_json(&from).is_none() {
                    return not_found();
                }
                if state.entry_json(&to).is_some() {
                    return error_response(409, "to/conflict/");
                }
                state.relocate(&from, &to, name == "files/move_v2");
                json_response(json!({ "metadata": state.entry_json(&to) }))
            }
            "files/get_thumbnail" => match state.files.get(&path("path")) {
                Some(_) => HttpResponse::new(200, b"\xff\xd8thumb".to_vec()),
                None => not_found(),
            },
            _ => error_response(400, "unknown_endpoint/"),
        }
    }
}

impl FakeState {
    fn store(&mut self, path: &str, data: Vec<u8>) {
        self.clock += 1;
        self.ensure_parents(path);
        self.files.insert(
            path.to_string(),
            FakeFile {
                data,
                modified: self.clock,
            },
        );
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut current = parent_of(path);
        while !current.is_empty() {
            self.folders.insert(current.to_string());
            current = parent_of(current);
        }
    }

    fn remove_tree(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        self.files
            .retain(|k, _| k != path && !k.starts_with(&prefix));
        self.folders
            .retain(|k| k != path && !k.starts_with(&prefix));
    }

    fn relocate(&mut self, from: &str, to: &str, remove_source: bool) {
        let prefix = format!("{}/", from);
        let rename = |k: &str| format!("{}{}", to, &k[from.len()..]);
        let files: Vec<(String, Vec<u8>, i64)> = self
            .files
            .iter()
            .filter(|(k, _)| k.as_str() == from || k.starts_with(&prefix))
            .map(|(k, f)| (rename(k.as_str()), f.data.clone(), f.modified))
            .collect();
        let folders: Vec<String> = self
            .folders
            .iter()
            .filter(|k| k.as_str() == from || k.starts_with(&prefix))
            .map(|k| rename(k.as_str()))
            .collect();
        if remove_source {
            self.remove_tree(from);
        }
        self.ensure_parents(to);
        for (path, data, modified) in files {
            self.files.insert(path, FakeFile { data, modified });
        }
        self.folders.extend(folders);
    }

    fn entry_json(&self, path: &str) -> Option<Value> {
        let name = path.rsplit('/').next().unwrap_or_default();
        if let Some(file) = self.files.get(path) {
            let modified = DateTime::<Utc>::from_timestamp(1_700_000_000 + file.modified, 0)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
            return Some(json!({
                ".tag": "file",
                "name": name,
                "path_display": path,
                "size": file.data.len(),
                "server_modified": modified,
            }));
        }
        self.folders.contains(path).then(|| {
            json!({
                ".tag": "folder",
                "name": name,
                "path_display": path,
            })
        })
    }

    fn list(&self, dir: &str, offset: usize) -> HttpResponse {
        if !dir.is_empty() && !self.folders.contains(dir) {
            return not_found();
        }
        let children: BTreeSet<&String> = self
            .files
            .keys()
            .chain(self.folders.iter())
            .filter(|p| parent_of(p.as_str()) == dir)
            .collect();
        let children: Vec<&String> = children.into_iter().collect();
        let end = offset
            .saturating_add(self.page_size.unwrap_or(usize::MAX))
            .min(children.len());
        let entries: Vec<Value> = children[offset.min(end)..end]
            .iter()
            .filter_map(|p| self.entry_json(p.as_str()))
            .collect();
        json_response(json!({
            "entries": entries,
            "cursor": format!("{}|{}", dir, end),
            "has_more": end < children.len(),
        }))
    }

    fn download(&self, path: &str, range: Option<&str>) -> HttpResponse {
        let Some(file) = self.files.get(path) else {
            return not_found();
        };
        let len = file.data.len() as u64;
        let (start, end) = range
            .and_then(|r| r.strip_prefix("bytes="))
            .and_then(|r| r.split_once('-'))
            .map(|(a, b)| (a.parse::<u64>().unwrap_or(0), b.parse::<u64>().ok()))
            .unwrap_or((0, None));
        if start >= len {
            return error_response(416, "");
        }
        let end = end.map_or(len - 1, |e| e.min(len - 1));
        HttpResponse::new(200, file.data[start as usize..=end as usize].to_vec())
    }

    /// Validate an upload-session cursor against the buffered length.
    fn session_at(&self, cursor: &Value) -> std::result::Result<String, HttpResponse> {
        let id = cursor["session_id"].as_str().unwrap_or_default().to_string();
        let offset = cursor["offset"].as_u64().unwrap_or(u64::MAX);
        match self.sessions.get(&id) {
            None => Err(error_response(409, "lookup_failed/not_found/")),
            Some(buf) if buf.len() as u64 != offset => {
                Err(error_response(409, "lookup_failed/incorrect_offset/"))
            }
            Some(_) => Ok(id),
        }
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

fn error_response(status: u16, summary: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "error_summary": summary }).to_string())
}

fn not_found() -> HttpResponse {
    error_response(409, "path/not_found/")
}

/// Host that records mounts, unmounts and notifications.
#[derive(Default)]
pub(crate) struct FakeHost {
    mounted: Mutex<Vec<MountOptions>>,
    unmounted: Mutex<Vec<String>>,
    notifications: Mutex<Vec<ChangeNotification>>,
}

impl FakeHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn mounts(&self) -> Vec<MountOptions> {
        self.mounted.lock().unwrap().clone()
    }

    pub(crate) fn unmounts(&self) -> Vec<String> {
        self.unmounted.lock().unwrap().clone()
    }

    pub(crate) fn notifications(&self) -> Vec<ChangeNotification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderHost for FakeHost {
    async fn mount(&self, options: MountOptions) -> Result<()> {
        self.mounted.lock().unwrap().push(options);
        Ok(())
    }

    async fn unmount(&self, file_system_id: &str) -> Result<()> {
        self.mounted
            .lock()
            .unwrap()
            .retain(|m| m.file_system_id != file_system_id);
        self.unmounted
            .lock()
            .unwrap()
            .push(file_system_id.to_string());
        Ok(())
    }

    async fn mounted_file_systems(&self) -> Result<Vec<String>> {
        Ok(self
            .mounted
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.file_system_id.clone())
            .collect())
    }

    async fn notify(&self, notification: ChangeNotification) -> Result<()> {
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Authorizer handing out a fixed sequence of tokens.
pub(crate) struct SequenceAuthorizer {
    tokens: Mutex<VecDeque<String>>,
}

impl SequenceAuthorizer {
    pub(crate) fn new(tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
        })
    }
}

#[async_trait]
impl Authorizer for SequenceAuthorizer {
    async fn authorize(&self) -> Result<String> {
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FsError::Authorization("user cancelled".to_string()))
    }
}
