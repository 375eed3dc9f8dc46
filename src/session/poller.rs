//! Polling-based change detection for watched directories.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use super::registry::Registry;
use super::session::Session;
use crate::error::{FsError, Result};
use crate::fs::EntryMetadata;
use crate::host::{ChangeNotification, ChangeType, EntryChange};

/// Compare a cached listing with a fresh one, by entry name.
///
/// New or modified entries are `Changed`, vanished ones `Deleted`.
/// Folders carry no modification time, so two folders with the same name
/// are never reported.
pub fn diff_listing(
    old: &BTreeMap<String, EntryMetadata>,
    new: &[EntryMetadata],
) -> Vec<EntryChange> {
    let mut changes: Vec<EntryChange> = new
        .iter()
        .filter(|entry| match old.get(&entry.name) {
            None => true,
            Some(previous) => is_modified(previous, entry),
        })
        .map(|entry| EntryChange {
            entry_path: entry.name.clone(),
            change_type: ChangeType::Changed,
        })
        .collect();

    changes.extend(
        old.keys()
            .filter(|name| !new.iter().any(|e| &e.name == *name))
            .map(|name| EntryChange {
                entry_path: name.clone(),
                change_type: ChangeType::Deleted,
            }),
    );
    changes
}

fn is_modified(old: &EntryMetadata, new: &EntryMetadata) -> bool {
    if old.is_directory != new.is_directory {
        return true;
    }
    if new.is_directory {
        return false;
    }
    old.size != new.size || old.modification_time != new.modification_time
}

impl Session {
    /// Re-list every watched directory, diff against the cached listing
    /// and replace it. One notification per differing entry.
    pub async fn poll_changes(&self) -> Result<Vec<ChangeNotification>> {
        let mut notifications = Vec::new();

        for dir in self.watched().await {
            let entries = match self.client.read_directory(&dir).await {
                Ok(entries) => entries,
                Err(FsError::AccessTokenExpired) => return Err(FsError::AccessTokenExpired),
                Err(e) => {
                    warn!(tenant = %self.tenant_id, dir = %dir, error = %e, "poll failed");
                    continue;
                }
            };

            let changes = {
                let mut cache = self.cache.lock().await;
                let changes = cache
                    .dir(&dir)
                    .map(|old| diff_listing(old, &entries))
                    .unwrap_or_default();
                cache.put(&dir, entries);
                changes
            };

            if !changes.is_empty() {
                debug!(tenant = %self.tenant_id, dir = %dir, changes = changes.len(), "changes detected");
            }
            notifications.extend(changes.into_iter().map(|change| ChangeNotification {
                file_system_id: self.tenant_id.clone(),
                observed_path: dir.clone(),
                recursive: false,
                change_type: ChangeType::Changed,
                changes: vec![change],
            }));
        }

        Ok(notifications)
    }
}

impl Registry {
    /// One poll round over every active tenant. Returns the number of
    /// notifications delivered; does nothing unless polling is enabled.
    pub async fn poll_watchers(&self) -> Result<usize> {
        if !self.store().settings().await?.use_watcher_polling {
            return Ok(0);
        }

        let sessions = self.active_sessions().await;
        let results = join_all(sessions.iter().map(|s| s.poll_changes())).await;

        let mut delivered = 0;
        for (session, result) in sessions.iter().zip(results) {
            match result {
                Ok(notifications) => {
                    for notification in notifications {
                        match self.host().notify(notification).await {
                            Ok(()) => delivered += 1,
                            Err(e) => warn!(tenant = session.tenant_id(), error = %e, "notify failed"),
                        }
                    }
                }
                Err(FsError::AccessTokenExpired) => self.expire(session.tenant_id()).await,
                Err(e) => warn!(tenant = session.tenant_id(), error = %e, "poll failed"),
            }
        }
        Ok(delivered)
    }
}

/// Background task running [`Registry::poll_watchers`] on a fixed period.
pub struct ChangePoller {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ChangePoller {
    pub fn spawn(registry: Arc<Registry>) -> Self {
        let (tx, rx) = oneshot::channel();
        let period = registry.config().poll_interval;
        let task = tokio::spawn(run(registry, period, rx));
        Self {
            shutdown: Some(tx),
            task,
        }
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

async fn run(registry: Arc<Registry>, period: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut next_poll = Instant::now() + period;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = sleep_until(next_poll) => {
                match registry.poll_watchers().await {
                    Ok(0) => {}
                    Ok(n) => debug!(notifications = n, "poll round done"),
                    Err(e) => warn!(error = %e, "poll round failed"),
                }
                next_poll = Instant::now() + period;
            }
        }
    }
}
