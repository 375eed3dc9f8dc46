//! Open-file handle state.
//!
//! A write handle moves through
//! `WritePending -> Uploading { session_id, next_offset } -> (closed)`;
//! any append or commit failure moves it to `Failed`, from which only
//! close is accepted.

use serde::Deserialize;

/// Mode requested by the host when opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenMode {
    Read,
    Write,
}

/// Server-side upload session bound to one write handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub session_id: String,
    /// Bytes confirmed so far; the next append must start here.
    pub next_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    ReadOnly,
    /// Opened for writing, nothing sent yet.
    WritePending,
    Uploading(UploadSession),
    /// A previous append or commit failed.
    Failed(String),
}

/// One entry of the open-file-handle table.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub path: String,
    pub state: HandleState,
}

impl OpenFile {
    pub fn new(path: String, mode: OpenMode) -> Self {
        let state = match mode {
            OpenMode::Read => HandleState::ReadOnly,
            OpenMode::Write => HandleState::WritePending,
        };
        Self { path, state }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.state, HandleState::ReadOnly)
    }

    /// Mark the handle unusable for further writes.
    pub fn poison(&mut self, reason: impl Into<String>) {
        self.state = HandleState::Failed(reason.into());
    }

    /// The upload session, if one was started.
    pub fn session(&self) -> Option<&UploadSession> {
        match &self.state {
            HandleState::Uploading(session) => Some(session),
            _ => None,
        }
    }
}
