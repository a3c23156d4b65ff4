//! Builds a snapshot of every file visible to every user of a domain.
//!
//! Each (user, scope) listing runs concurrently, bounded by
//! `max_concurrency`. All listings insert into one shared snapshot behind a
//! single lock; a file seen by several users is normalized and stored once.

use crate::error::{AuditError, DriveError, Result};
use crate::model::{FileRecord, Identity, Snapshot};
use crate::normalize::{needs_detail_lookup, normalize};
use crate::service::{DirectoryService, DriveService, FileScope, RawFileEntry};
use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::watch;

/// Snapshot under construction plus the ids some task has already taken on.
#[derive(Default)]
struct CaptureState {
    snapshot: Snapshot,
    claimed: HashSet<String>,
}

impl CaptureState {
    /// Take ownership of `id` for this task. False if it is already stored or
    /// another task is processing it.
    fn claim(&mut self, id: &str) -> bool {
        !self.snapshot.contains(id) && self.claimed.insert(id.to_string())
    }
}

pub struct Capturer<'a> {
    drive: &'a dyn DriveService,
    max_concurrency: usize,
    progress: watch::Sender<usize>,
}

impl<'a> Capturer<'a> {
    pub fn new(drive: &'a dyn DriveService, max_concurrency: usize) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            drive,
            max_concurrency: max_concurrency.max(1),
            progress,
        }
    }

    /// Number of files captured so far. Only the latest value is retained, so
    /// an observer may skip counts but never sees them decrease.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.progress.subscribe()
    }

    /// List the domain's users through `directory`, then capture them all.
    pub async fn capture_domain(
        &self,
        directory: &dyn DirectoryService,
        domain: &str,
    ) -> Result<Snapshot> {
        let users = directory.list_domain_users(domain).await?;
        tracing::info!(domain, users = users.len(), "listed domain users");
        self.capture_users(&users).await
    }

    /// Capture every file visible to `users`. Any fatal error aborts the whole
    /// run and no snapshot is returned.
    pub async fn capture_users(&self, users: &[Identity]) -> Result<Snapshot> {
        let state = Mutex::new(CaptureState::default());

        let scopes: Vec<(&str, FileScope)> = stream::iter(users)
            .map(|user| self.discover_scopes(&state, user))
            .buffered(self.max_concurrency)
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .flatten()
            .collect();
        tracing::debug!(scopes = scopes.len(), "discovered listing scopes");

        stream::iter(scopes.into_iter().map(Ok::<_, AuditError>))
            .try_for_each_concurrent(self.max_concurrency, |(user, scope)| {
                self.capture_scope(&state, user, scope)
            })
            .await?;

        let snapshot = state.into_inner().snapshot;
        tracing::info!(files = snapshot.len(), "capture complete");
        Ok(snapshot)
    }

    /// Record the user's shared drives and My Drive root as container nodes and
    /// return the listings to run for this user.
    async fn discover_scopes<'u>(
        &self,
        state: &Mutex<CaptureState>,
        user: &'u str,
    ) -> Result<Vec<(&'u str, FileScope)>> {
        let drives = self.drive.list_drives(user).await?;
        let root_id = self.drive.root_folder_id(user).await?;

        let mut scopes = Vec::with_capacity(drives.len() + 1);
        for drive in drives {
            self.record(state, FileRecord::container(&drive.id, &drive.name));
            scopes.push((user, FileScope::Drive { drive_id: drive.id }));
        }
        self.record(
            state,
            FileRecord::container(root_id, format!("{user} My Drive")),
        );
        scopes.push((user, FileScope::MyDrive));
        Ok(scopes)
    }

    async fn capture_scope(
        &self,
        state: &Mutex<CaptureState>,
        user: &str,
        scope: FileScope,
    ) -> Result<()> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .drive
                .list_files(user, &scope, page_token.as_deref())
                .await?;
            if page.incomplete {
                return Err(AuditError::IncompleteCapture {
                    user: user.to_string(),
                    scope: scope.to_string(),
                });
            }
            for entry in &page.files {
                // Claimed under the lock before any await, so a file shared by
                // several users is looked up and normalized by one task only.
                let claimed = state.lock().claim(&entry.id);
                if !claimed {
                    continue;
                }
                let record = self.normalize_entry(user, entry).await?;
                self.record(state, record);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        tracing::debug!(user, %scope, "scope captured");
        Ok(())
    }

    async fn normalize_entry(&self, user: &str, entry: &RawFileEntry) -> Result<FileRecord> {
        let details = if needs_detail_lookup(entry) {
            match self.drive.list_permission_details(user, &entry.id).await {
                Ok(details) => details,
                Err(DriveError::InsufficientPermission(_)) => {
                    tracing::debug!(user, file = %entry.id, "permission details not visible");
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Vec::new()
        };
        normalize(entry, &details)
    }

    fn record(&self, state: &Mutex<CaptureState>, file: FileRecord) {
        let mut state = state.lock();
        if state.snapshot.insert(file) {
            self.progress.send_replace(state.snapshot.len());
        }
    }
}
