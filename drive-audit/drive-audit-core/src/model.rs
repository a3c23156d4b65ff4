//! Shared data types for captured files and their permissions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An email address (or derived key for domain/anyone grants).
pub type Identity = String;

/// Literal identity used for link-sharing grants that carry no address.
pub const ANYONE_IDENTITY: &str = "anyone";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PermissionType {
    User,
    Group,
    Domain,
    Anyone,
    #[serde(other)]
    Unknown,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::User => "user",
            PermissionType::Group => "group",
            PermissionType::Domain => "domain",
            PermissionType::Anyone => "anyone",
            PermissionType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "user" => PermissionType::User,
            "group" => PermissionType::Group,
            "domain" => PermissionType::Domain,
            "anyone" => PermissionType::Anyone,
            _ => PermissionType::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Owner,
    Organizer,
    FileOrganizer,
    Writer,
    Commenter,
    Reader,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Organizer => "organizer",
            Role::FileOrganizer => "fileOrganizer",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
            Role::Reader => "reader",
            Role::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "owner" => Role::Owner,
            "organizer" => Role::Organizer,
            "fileOrganizer" => Role::FileOrganizer,
            "writer" => Role::Writer,
            "commenter" => Role::Commenter,
            "reader" => Role::Reader,
            _ => Role::Unknown,
        }
    }

    /// `organizer` is how shared drives express ownership.
    pub fn is_ownership(&self) -> bool {
        matches!(self, Role::Owner | Role::Organizer)
    }
}

/// One identity's access to one file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    /// Empty when the source did not expose a permission id.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub permission_type: PermissionType,
    pub role: Role,
    #[serde(default)]
    pub inherited: bool,
}

impl PermissionRecord {
    pub fn new(
        id: impl Into<String>,
        permission_type: PermissionType,
        role: Role,
        inherited: bool,
    ) -> Self {
        Self {
            id: id.into(),
            permission_type,
            role,
            inherited,
        }
    }

    /// Backstop record for an owner listed on the file object.
    pub fn owner() -> Self {
        Self::new("", PermissionType::User, Role::Owner, false)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    /// Empty for root-level entries.
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, rename = "openURL")]
    pub open_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharer_email: Option<String>,
    #[serde(default)]
    pub permissions: BTreeMap<Identity, PermissionRecord>,
}

impl FileRecord {
    /// A container node (shared drive, My Drive root) that only carries a name.
    pub fn container(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn permission(&self, identity: &str) -> Option<&PermissionRecord> {
        self.permissions.get(identity)
    }
}

/// Point-in-time capture of every file and its normalized permissions.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Snapshot {
    files: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut snapshot = Self::new();
        for file in files {
            snapshot.insert(file);
        }
        snapshot
    }

    /// Insert a record unless its id is already known. Returns whether it was added.
    pub fn insert(&mut self, file: FileRecord) -> bool {
        if self.files.contains_key(&file.id) {
            return false;
        }
        self.files.insert(file.id.clone(), file);
        true
    }

    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.files.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.files.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in ascending id order.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> + '_ {
        self.files.values()
    }
}

/// A planned permission delete, authorized as `owner_email`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RevocationTarget {
    pub owner_email: Identity,
    pub file_id: String,
    pub permission_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_first_writer_wins() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.insert(FileRecord::container("a", "first")));
        assert!(!snapshot.insert(FileRecord::container("a", "second")));
        assert_eq!(snapshot.get("a").unwrap().name, "first");
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::from_str("fileOrganizer"), Role::FileOrganizer);
        assert_eq!(Role::from_str("something"), Role::Unknown);
        assert_eq!(Role::FileOrganizer.as_str(), "fileOrganizer");
        let role: Role = serde_json::from_str("\"commenter\"").unwrap();
        assert_eq!(role, Role::Commenter);
        let role: Role = serde_json::from_str("\"publishedReader\"").unwrap();
        assert_eq!(role, Role::Unknown);
    }

    #[test]
    fn ownership_roles() {
        assert!(Role::Owner.is_ownership());
        assert!(Role::Organizer.is_ownership());
        assert!(!Role::FileOrganizer.is_ownership());
        assert!(!Role::Writer.is_ownership());
    }

    #[test]
    fn files_iterate_in_id_order() {
        let snapshot = Snapshot::from_files(vec![
            FileRecord::container("c", "C"),
            FileRecord::container("a", "A"),
            FileRecord::container("b", "B"),
        ]);
        let ids: Vec<_> = snapshot.files().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
