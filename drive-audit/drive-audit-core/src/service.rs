//! Contracts of the directory and drive services consumed by capture and
//! revocation, together with the wire shapes they return.

use crate::error::DriveError;
use crate::model::Identity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(default)]
    pub email_address: String,
}

/// Entry of the permission list embedded in a file object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPermission {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, rename = "type")]
    pub permission_type: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPermissionDetail {
    #[serde(default)]
    pub permission_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub inherited: bool,
}

/// Permission as returned by the per-file permission lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetailedPermission {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, rename = "type")]
    pub permission_type: String,
    #[serde(default)]
    pub permission_details: Vec<RawPermissionDetail>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFileEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub owners: Vec<RawUser>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<RawPermission>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub sharing_user: Option<RawUser>,
    #[serde(default)]
    pub web_view_link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDrive {
    pub id: String,
    pub name: String,
}

/// One page of a file listing.
#[derive(Clone, Debug, Default)]
pub struct FilePage {
    pub files: Vec<RawFileEntry>,
    pub next_page_token: Option<String>,
    /// The service could not search every corpus; the listing is partial.
    pub incomplete: bool,
}

/// Which corpus a file listing covers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileScope {
    /// Non-trashed files inside one shared drive.
    Drive { drive_id: String },
    /// Non-trashed files in the user's My Drive that the user owns.
    MyDrive,
}

impl fmt::Display for FileScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileScope::Drive { drive_id } => write!(f, "drive {}", drive_id),
            FileScope::MyDrive => write!(f, "my drive"),
        }
    }
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Primary email of every user in `domain`, across all pages.
    async fn list_domain_users(&self, domain: &str) -> Result<Vec<Identity>, DriveError>;
}

/// Drive operations, each performed while impersonating `user`.
#[async_trait]
pub trait DriveService: Send + Sync {
    async fn list_drives(&self, user: &str) -> Result<Vec<SharedDrive>, DriveError>;

    /// Id of the user's My Drive root folder.
    async fn root_folder_id(&self, user: &str) -> Result<String, DriveError>;

    async fn list_files(
        &self,
        user: &str,
        scope: &FileScope,
        page_token: Option<&str>,
    ) -> Result<FilePage, DriveError>;

    /// Every permission of `file_id`, across all pages.
    async fn list_permission_details(
        &self,
        user: &str,
        file_id: &str,
    ) -> Result<Vec<RawDetailedPermission>, DriveError>;

    async fn delete_permission(
        &self,
        owner: &str,
        file_id: &str,
        permission_id: &str,
    ) -> Result<(), DriveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entry_from_api_json() {
        let json = r#"{
            "id": "f1",
            "name": "Budget",
            "mimeType": "application/vnd.google-apps.spreadsheet",
            "owners": [{"emailAddress": "alice@x.com"}],
            "parents": ["folder"],
            "permissions": [{"id": "p1", "emailAddress": "bob@x.com", "type": "user", "role": "reader"}],
            "shared": true,
            "sharingUser": {"emailAddress": "alice@x.com"},
            "webViewLink": "https://example.com/f1"
        }"#;
        let entry: RawFileEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "f1");
        assert_eq!(entry.owners[0].email_address, "alice@x.com");
        assert_eq!(entry.permissions[0].permission_type, "user");
        assert!(entry.shared);
        assert!(entry.drive_id.is_none());
        assert_eq!(entry.sharing_user.unwrap().email_address, "alice@x.com");
    }

    #[test]
    fn scope_display() {
        let scope = FileScope::Drive {
            drive_id: "d1".to_string(),
        };
        assert_eq!(scope.to_string(), "drive d1");
        assert_eq!(FileScope::MyDrive.to_string(), "my drive");
    }
}
