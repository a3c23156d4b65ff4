//! Collapses the three permission sources of a file into one mapping.
//!
//! Sources are applied as ordered passes over a map keyed by identity. A pass
//! only inserts identities that are still absent, so an earlier source always
//! wins over a later one:
//!
//! 1. the permission list embedded in the file object,
//! 2. the per-file permission lookup (only when pass 1 found nothing and the
//!    file is not flagged as shared),
//! 3. the owner list, as a backstop.

use crate::error::{AuditError, Result};
use crate::model::{FileRecord, Identity, PermissionRecord, PermissionType, Role, ANYONE_IDENTITY};
use crate::service::{RawDetailedPermission, RawFileEntry};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Whether the per-file permission lookup has to be consulted for `entry`.
pub fn needs_detail_lookup(entry: &RawFileEntry) -> bool {
    entry.permissions.is_empty() && !entry.shared
}

/// Build the normalized record for one file.
///
/// `details` holds the result of the per-file lookup; it is ignored unless
/// [`needs_detail_lookup`] holds for `entry`.
pub fn normalize(entry: &RawFileEntry, details: &[RawDetailedPermission]) -> Result<FileRecord> {
    let mut permissions = BTreeMap::new();

    for p in &entry.permissions {
        let permission_type = PermissionType::from_str(&p.permission_type);
        let Some(identity) = grant_identity(&p.email_address, &p.domain, permission_type) else {
            tracing::debug!(file = %entry.id, permission = %p.id, "skipping permission without identity");
            continue;
        };
        insert_absent(
            &mut permissions,
            identity,
            PermissionRecord::new(p.id.clone(), permission_type, Role::from_str(&p.role), false),
        );
    }

    if needs_detail_lookup(entry) {
        for p in details {
            // Detail entries say whether the grant is on the file or through
            // membership; the grantee kind comes from the permission itself.
            let permission_type = PermissionType::from_str(&p.permission_type);
            let Some(identity) = grant_identity(&p.email_address, &p.domain, permission_type) else {
                continue;
            };
            for detail in &p.permission_details {
                insert_absent(
                    &mut permissions,
                    identity.clone(),
                    PermissionRecord::new(
                        p.id.clone(),
                        permission_type,
                        Role::from_str(&detail.role),
                        detail.inherited,
                    ),
                );
            }
        }
    }

    for owner in &entry.owners {
        if owner.email_address.is_empty() {
            continue;
        }
        insert_absent(
            &mut permissions,
            owner.email_address.clone(),
            PermissionRecord::owner(),
        );
    }

    if permissions.is_empty() {
        return Err(AuditError::MissingPermissions {
            file_id: entry.id.clone(),
            name: entry.name.clone(),
        });
    }

    Ok(FileRecord {
        id: entry.id.clone(),
        name: entry.name.clone(),
        parent_id: resolve_parent(entry),
        mime_type: entry.mime_type.clone(),
        open_url: entry.web_view_link.clone(),
        sharer_email: entry
            .sharing_user
            .as_ref()
            .map(|u| u.email_address.clone())
            .filter(|e| !e.is_empty()),
        permissions,
    })
}

/// A file may list several parents; only the first is kept. Files at the top
/// of a shared drive have none and hang off the drive itself.
fn resolve_parent(entry: &RawFileEntry) -> String {
    entry
        .parents
        .first()
        .cloned()
        .or_else(|| entry.drive_id.clone())
        .unwrap_or_default()
}

fn grant_identity(email: &str, domain: &str, permission_type: PermissionType) -> Option<Identity> {
    if !email.is_empty() {
        return Some(email.to_string());
    }
    match permission_type {
        PermissionType::Domain if !domain.is_empty() => Some(domain.to_string()),
        PermissionType::Anyone => Some(ANYONE_IDENTITY.to_string()),
        _ => None,
    }
}

fn insert_absent(
    permissions: &mut BTreeMap<Identity, PermissionRecord>,
    identity: Identity,
    record: PermissionRecord,
) {
    if let Entry::Vacant(slot) = permissions.entry(identity) {
        slot.insert(record);
    }
}
