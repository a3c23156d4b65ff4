use super::auth::{ServiceAccountKey, ServiceAccountTokens, TokenSource};
use crate::error::DriveError;
use crate::model::Identity;
use crate::service::{
    DirectoryService, DriveService, FilePage, FileScope, RawDetailedPermission, RawFileEntry,
    SharedDrive,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub const DIRECTORY_READONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/admin.directory.user.readonly";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DIRECTORY_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

const FILE_FIELDS: &str = "nextPageToken, incompleteSearch, files(id, driveId, mimeType, name, owners(emailAddress), parents, permissions(id, emailAddress, domain, type, role), shared, sharingUser(emailAddress), webViewLink)";
const PERMISSION_FIELDS: &str = "nextPageToken, permissions(id, emailAddress, domain, type, permissionDetails(role, permissionType, inherited))";
const INSUFFICIENT_FILE_PERMISSIONS: &str = "insufficientFilePermissions";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserList {
    #[serde(default)]
    users: Vec<UserEntry>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEntry {
    primary_email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveList {
    #[serde(default)]
    drives: Vec<SharedDrive>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RawFileEntry>,
    next_page_token: Option<String>,
    #[serde(default)]
    incomplete_search: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<RawDetailedPermission>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct FileId {
    id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: String,
}

/// Directory and Drive REST client acting through a service account with
/// domain-wide delegation.
pub struct GoogleWorkspace {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    admin_email: String,
    page_size: u32,
}

impl GoogleWorkspace {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        admin_email: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            http,
            tokens,
            admin_email: admin_email.into(),
            page_size,
        }
    }

    /// Build a client that signs its own tokens from a service account key file.
    pub fn from_credentials(
        credentials: impl AsRef<Path>,
        admin_email: impl Into<String>,
        page_size: u32,
    ) -> Result<Self, DriveError> {
        let key = ServiceAccountKey::from_file(credentials)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("drive-audit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = ServiceAccountTokens::new(key, http.clone())?;
        Ok(Self::new(http, Arc::new(tokens), admin_email, page_size))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        subject: &str,
        scope: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, DriveError> {
        let token = self.tokens.token(subject, scope).await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }
}

/// Map an error response onto the failure kinds callers act upon.
pub(crate) fn classify_error(status: u16, body: &str) -> DriveError {
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.message,
            envelope
                .error
                .errors
                .into_iter()
                .map(|e| e.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.to_string(), Vec::new()),
    };
    if status == 403 && reasons.iter().any(|r| r == INSUFFICIENT_FILE_PERMISSIONS) {
        return DriveError::InsufficientPermission(message);
    }
    match status {
        401 | 403 => DriveError::Authorization(message),
        _ => DriveError::Api { status, message },
    }
}

pub(crate) fn file_list_query(
    scope: &FileScope,
    page_size: u32,
    page_token: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("supportsAllDrives", "true".to_string()),
        ("includeItemsFromAllDrives", "true".to_string()),
        ("pageSize", page_size.to_string()),
        ("fields", FILE_FIELDS.to_string()),
    ];
    match scope {
        FileScope::Drive { drive_id } => {
            query.push(("corpora", "drive".to_string()));
            query.push(("driveId", drive_id.clone()));
            query.push(("q", "trashed=false".to_string()));
        }
        FileScope::MyDrive => {
            query.push(("corpora", "user".to_string()));
            query.push(("q", "trashed=false and 'me' in owners".to_string()));
        }
    }
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }
    query
}

fn with_page_token(
    mut query: Vec<(&'static str, String)>,
    page_token: &Option<String>,
) -> Vec<(&'static str, String)> {
    if let Some(token) = page_token {
        query.push(("pageToken", token.clone()));
    }
    query
}

fn next_token(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[async_trait]
impl DirectoryService for GoogleWorkspace {
    async fn list_domain_users(&self, domain: &str) -> Result<Vec<Identity>, DriveError> {
        let url = format!("{DIRECTORY_BASE}/users");
        let mut users = Vec::new();
        let mut page_token = None;
        loop {
            let query = with_page_token(
                vec![
                    ("domain", domain.to_string()),
                    ("fields", "nextPageToken, users(primaryEmail)".to_string()),
                ],
                &page_token,
            );
            let page: UserList = self
                .get_json(&self.admin_email, DIRECTORY_READONLY_SCOPE, &url, &query)
                .await?;
            users.extend(page.users.into_iter().map(|u| u.primary_email));
            page_token = next_token(page.next_page_token);
            if page_token.is_none() {
                break;
            }
        }
        Ok(users)
    }
}

#[async_trait]
impl DriveService for GoogleWorkspace {
    async fn list_drives(&self, user: &str) -> Result<Vec<SharedDrive>, DriveError> {
        let url = format!("{DRIVE_BASE}/drives");
        let mut drives = Vec::new();
        let mut page_token = None;
        loop {
            let query = with_page_token(
                vec![("fields", "nextPageToken, drives(id, name)".to_string())],
                &page_token,
            );
            let page: DriveList = self
                .get_json(user, DRIVE_READONLY_SCOPE, &url, &query)
                .await?;
            drives.extend(page.drives);
            page_token = next_token(page.next_page_token);
            if page_token.is_none() {
                break;
            }
        }
        Ok(drives)
    }

    async fn root_folder_id(&self, user: &str) -> Result<String, DriveError> {
        // "root" is an alias the files endpoint resolves to the My Drive folder.
        let url = format!("{DRIVE_BASE}/files/root");
        let file: FileId = self
            .get_json(user, DRIVE_READONLY_SCOPE, &url, &[("fields", "id".to_string())])
            .await?;
        Ok(file.id)
    }

    async fn list_files(
        &self,
        user: &str,
        scope: &FileScope,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError> {
        let url = format!("{DRIVE_BASE}/files");
        let query = file_list_query(scope, self.page_size, page_token);
        let page: FileList = self
            .get_json(user, DRIVE_READONLY_SCOPE, &url, &query)
            .await?;
        Ok(FilePage {
            files: page.files,
            next_page_token: next_token(page.next_page_token),
            incomplete: page.incomplete_search,
        })
    }

    async fn list_permission_details(
        &self,
        user: &str,
        file_id: &str,
    ) -> Result<Vec<RawDetailedPermission>, DriveError> {
        let url = format!("{DRIVE_BASE}/files/{file_id}/permissions");
        let mut permissions = Vec::new();
        let mut page_token = None;
        loop {
            let query = with_page_token(
                vec![
                    ("supportsAllDrives", "true".to_string()),
                    ("fields", PERMISSION_FIELDS.to_string()),
                ],
                &page_token,
            );
            let page: PermissionList = self
                .get_json(user, DRIVE_READONLY_SCOPE, &url, &query)
                .await?;
            permissions.extend(page.permissions);
            page_token = next_token(page.next_page_token);
            if page_token.is_none() {
                break;
            }
        }
        Ok(permissions)
    }

    async fn delete_permission(
        &self,
        owner: &str,
        file_id: &str,
        permission_id: &str,
    ) -> Result<(), DriveError> {
        let token = self.tokens.token(owner, DRIVE_SCOPE).await?;
        let url = format!("{DRIVE_BASE}/files/{file_id}/permissions/{permission_id}");
        let response = self
            .http
            .delete(&url)
            .bearer_auth(token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }
        Ok(())
    }
}
