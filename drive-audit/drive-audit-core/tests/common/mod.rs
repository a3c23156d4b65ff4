#![allow(dead_code)]

use async_trait::async_trait;
use drive_audit_core::service::{
    DirectoryService, DriveService, FilePage, FileScope, RawDetailedPermission, RawFileEntry,
    RawPermission, RawUser, SharedDrive,
};
use drive_audit_core::DriveError;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// In-memory domain: users, their drives and paginated file listings.
#[derive(Default)]
pub struct FakeWorkspace {
    pub users: Vec<String>,
    pub drives: HashMap<String, Vec<SharedDrive>>,
    pub roots: HashMap<String, String>,
    pub pages: HashMap<(String, FileScope), Vec<FilePage>>,
    pub details: HashMap<String, Vec<RawDetailedPermission>>,
    pub hidden_details: HashSet<String>,
    /// (user, file) pairs whose detail lookup is refused for that user only.
    pub hidden_from: HashSet<(String, String)>,
    pub failing_deletes: HashSet<String>,
    /// Cancelled once the first delete has gone through.
    pub cancel_on_delete: Option<CancellationToken>,
    pub deleted: Mutex<Vec<(String, String, String)>>,
    pub detail_lookups: Mutex<Vec<String>>,
}

impl FakeWorkspace {
    pub fn add_user(&mut self, user: &str) {
        self.users.push(user.to_string());
        self.roots
            .insert(user.to_string(), format!("root-{user}"));
    }

    pub fn add_drive(&mut self, user: &str, id: &str, name: &str) {
        self.drives.entry(user.to_string()).or_default().push(SharedDrive {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn add_page(&mut self, user: &str, scope: FileScope, files: Vec<RawFileEntry>) {
        self.add_page_with(user, scope, files, false);
    }

    pub fn add_page_with(
        &mut self,
        user: &str,
        scope: FileScope,
        files: Vec<RawFileEntry>,
        incomplete: bool,
    ) {
        let pages = self.pages.entry((user.to_string(), scope)).or_default();
        pages.push(FilePage {
            files,
            next_page_token: None,
            incomplete,
        });
        let count = pages.len();
        for (i, page) in pages.iter_mut().enumerate() {
            page.next_page_token = if i + 1 < count {
                Some((i + 1).to_string())
            } else {
                None
            };
        }
    }

    pub async fn deleted(&self) -> Vec<(String, String, String)> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl DirectoryService for FakeWorkspace {
    async fn list_domain_users(&self, _domain: &str) -> Result<Vec<String>, DriveError> {
        Ok(self.users.clone())
    }
}

#[async_trait]
impl DriveService for FakeWorkspace {
    async fn list_drives(&self, user: &str) -> Result<Vec<SharedDrive>, DriveError> {
        Ok(self.drives.get(user).cloned().unwrap_or_default())
    }

    async fn root_folder_id(&self, user: &str) -> Result<String, DriveError> {
        self.roots
            .get(user)
            .cloned()
            .ok_or_else(|| DriveError::Authorization(format!("unknown user {user}")))
    }

    async fn list_files(
        &self,
        user: &str,
        scope: &FileScope,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError> {
        let Some(pages) = self.pages.get(&(user.to_string(), scope.clone())) else {
            return Ok(FilePage::default());
        };
        let index = match page_token {
            Some(t) => t.parse::<usize>().map_err(|_| DriveError::Api {
                status: 400,
                message: "bad page token".to_string(),
            })?,
            None => 0,
        };
        Ok(pages.get(index).cloned().unwrap_or_default())
    }

    async fn list_permission_details(
        &self,
        user: &str,
        file_id: &str,
    ) -> Result<Vec<RawDetailedPermission>, DriveError> {
        self.detail_lookups.lock().await.push(file_id.to_string());
        // Let other listings run while this request is "in flight".
        tokio::task::yield_now().await;
        if self.hidden_details.contains(file_id)
            || self
                .hidden_from
                .contains(&(user.to_string(), file_id.to_string()))
        {
            return Err(DriveError::InsufficientPermission(file_id.to_string()));
        }
        Ok(self.details.get(file_id).cloned().unwrap_or_default())
    }

    async fn delete_permission(
        &self,
        owner: &str,
        file_id: &str,
        permission_id: &str,
    ) -> Result<(), DriveError> {
        if self.failing_deletes.contains(file_id) {
            return Err(DriveError::Authorization(format!(
                "{owner} cannot change {file_id}"
            )));
        }
        self.deleted.lock().await.push((
            owner.to_string(),
            file_id.to_string(),
            permission_id.to_string(),
        ));
        if let Some(cancel) = &self.cancel_on_delete {
            cancel.cancel();
        }
        Ok(())
    }
}

pub fn owned_file(id: &str, owner: &str, parents: &[&str]) -> RawFileEntry {
    RawFileEntry {
        id: id.to_string(),
        name: format!("{id}.txt"),
        mime_type: "text/plain".to_string(),
        owners: vec![RawUser {
            email_address: owner.to_string(),
        }],
        parents: parents.iter().map(|p| p.to_string()).collect(),
        web_view_link: format!("https://example.com/{id}"),
        ..Default::default()
    }
}

pub fn drive_file(id: &str, drive_id: &str, grants: &[(&str, &str, &str)]) -> RawFileEntry {
    RawFileEntry {
        id: id.to_string(),
        name: format!("{id}.doc"),
        drive_id: Some(drive_id.to_string()),
        permissions: grants
            .iter()
            .map(|(perm_id, email, role)| RawPermission {
                id: perm_id.to_string(),
                email_address: email.to_string(),
                permission_type: "user".to_string(),
                role: role.to_string(),
                ..Default::default()
            })
            .collect(),
        shared: true,
        ..Default::default()
    }
}

pub fn drive_scope(id: &str) -> FileScope {
    FileScope::Drive {
        drive_id: id.to_string(),
    }
}
