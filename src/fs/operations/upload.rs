//! Chunked uploads through upload sessions.

use tracing::{debug, info, warn};

use crate::api::types::WriteMode;
use crate::error::{FsError, Result};
use crate::fs::client::Client;
use crate::fs::upload_state::{HandleState, OpenFile, OpenMode, UploadSession};

impl Client {
    /// Append `data` at `offset` to the upload session of `file`.
    ///
    /// The first write starts the session. Each append carries at most one
    /// chunk and the tracked offset advances only after the append is
    /// confirmed. A write that does not start exactly at the tracked offset
    /// fails and poisons the handle, as does any failed append.
    pub async fn write_file(&self, file: &mut OpenFile, data: &[u8], offset: u64) -> Result<()> {
        let mut session = match file.state.clone() {
            HandleState::ReadOnly => {
                return Err(FsError::ProtocolViolation(format!(
                    "{} was opened read-only",
                    file.path
                )));
            }
            HandleState::Failed(_) => return Err(FsError::HandleFailed(file.path.clone())),
            HandleState::Uploading(session) => session,
            HandleState::WritePending => {
                if offset != 0 {
                    return Err(poison_gap(file, 0, offset));
                }
                let session_id = match self.api.upload_session_start().await {
                    Ok(id) => id,
                    Err(e) => {
                        file.poison(e.to_string());
                        return Err(e);
                    }
                };
                debug!(path = %file.path, session_id = %session_id, "upload session started");
                UploadSession {
                    session_id,
                    next_offset: 0,
                }
            }
        };

        if offset != session.next_offset {
            return Err(poison_gap(file, session.next_offset, offset));
        }

        for chunk in data.chunks(self.chunk_size) {
            if let Err(e) = self
                .api
                .upload_session_append(&session.session_id, session.next_offset, chunk.to_vec())
                .await
            {
                warn!(
                    path = %file.path,
                    offset = session.next_offset,
                    error = %e,
                    "append failed, handle poisoned"
                );
                file.poison(e.to_string());
                return Err(e);
            }
            session.next_offset += chunk.len() as u64;
        }

        file.state = HandleState::Uploading(session);
        Ok(())
    }

    /// Commit the upload session of `file`, if any, with overwrite semantics.
    ///
    /// Returns whether a commit happened.
    pub async fn close_file(&self, file: &mut OpenFile) -> Result<bool> {
        let session = match file.state.clone() {
            HandleState::ReadOnly | HandleState::WritePending => return Ok(false),
            HandleState::Failed(reason) => {
                warn!(path = %file.path, reason = %reason, "discarding failed handle");
                return Err(FsError::HandleFailed(file.path.clone()));
            }
            HandleState::Uploading(session) => session,
        };

        if let Err(e) = self
            .api
            .upload_session_finish(
                &session.session_id,
                session.next_offset,
                &file.path,
                WriteMode::Overwrite,
            )
            .await
        {
            file.poison(e.to_string());
            return Err(e);
        }

        info!(path = %file.path, bytes = session.next_offset, "upload committed");
        file.state = HandleState::WritePending;
        Ok(true)
    }

    /// Resize a file by rewriting it: download, slice or NUL-pad, then
    /// upload and commit immediately. Costs a full download and upload.
    pub async fn truncate(&self, path: &str, length: u64) -> Result<()> {
        let mut data = self.api.download(path, 0, None).await?;
        let original = data.len();
        let length = usize::try_from(length)
            .map_err(|_| FsError::Custom(format!("truncate length {} too large", length)))?;
        data.resize(length, 0);

        let mut file = OpenFile::new(path.to_string(), OpenMode::Write);
        self.write_file(&mut file, &data, 0).await?;
        self.close_file(&mut file).await?;

        info!(path, from = original, to = length, "truncated");
        Ok(())
    }
}

fn poison_gap(file: &mut OpenFile, expected: u64, got: u64) -> FsError {
    let reason = format!(
        "write at offset {} on {}, expected {}",
        got, file.path, expected
    );
    warn!("{}", reason);
    file.poison(reason.clone());
    FsError::ProtocolViolation(reason)
}
