//! Planning and execution of "remove this identity everywhere".
//!
//! Planning is a pure pass over a snapshot. Execution is the only stage that
//! talks to the drive service; it runs targets one by one, grouped by the
//! owner whose authority performs the delete.

use crate::model::{FileRecord, Identity, RevocationTarget, Snapshot};
use crate::service::DriveService;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Targets that remove `identity`'s own grants, in file-id order.
///
/// A file contributes a target only if it has a known owner (role `owner` or
/// `organizer`) and `identity` holds a non-inherited, non-ownership grant with
/// a permission id on it.
pub fn plan(snapshot: &Snapshot, identity: &str) -> Vec<RevocationTarget> {
    snapshot
        .files()
        .filter_map(|file| plan_file(file, identity))
        .collect()
}

fn plan_file(file: &FileRecord, identity: &str) -> Option<RevocationTarget> {
    let owner_email = owner_of(file)?;
    let permission = file.permission(identity)?;
    if permission.inherited || permission.role.is_ownership() || permission.id.is_empty() {
        return None;
    }
    Some(RevocationTarget {
        owner_email: owner_email.clone(),
        file_id: file.id.clone(),
        permission_id: permission.id.clone(),
    })
}

/// First identity, in identity order, holding an ownership role.
pub fn owner_of(file: &FileRecord) -> Option<&Identity> {
    file.permissions
        .iter()
        .find(|(_, p)| p.role.is_ownership())
        .map(|(email, _)| email)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevocationStatus {
    Revoked,
    /// Planned only; nothing was sent.
    DryRun,
    Failed(String),
    /// Not attempted because the run was cancelled first.
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevocationOutcome {
    pub target: RevocationTarget,
    pub status: RevocationStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevocationReport {
    pub outcomes: Vec<RevocationOutcome>,
}

impl RevocationReport {
    pub fn failures(&self) -> impl Iterator<Item = &RevocationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RevocationStatus::Failed(_)))
    }

    pub fn count(&self, predicate: impl Fn(&RevocationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, RevocationStatus::Failed(_)))
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(|s| *s == RevocationStatus::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| {
            matches!(o.status, RevocationStatus::Revoked | RevocationStatus::DryRun)
        })
    }
}

/// Group targets by owner, keeping plan order inside each group.
pub fn batch_by_owner(targets: &[RevocationTarget]) -> BTreeMap<&str, Vec<&RevocationTarget>> {
    let mut batches: BTreeMap<&str, Vec<&RevocationTarget>> = BTreeMap::new();
    for target in targets {
        batches
            .entry(target.owner_email.as_str())
            .or_default()
            .push(target);
    }
    batches
}

/// Issue one delete per target. Failures are recorded and do not stop the
/// remaining targets; cancellation stops new deletes but keeps those already
/// done.
pub async fn execute(
    drive: &dyn DriveService,
    targets: &[RevocationTarget],
    dry_run: bool,
    cancel: &CancellationToken,
) -> RevocationReport {
    let mut report = RevocationReport::default();
    for (owner, batch) in batch_by_owner(targets) {
        tracing::debug!(owner, targets = batch.len(), "revoking as owner");
        for target in batch {
            let status = if cancel.is_cancelled() {
                RevocationStatus::Cancelled
            } else {
                tracing::info!(
                    file = %target.file_id,
                    permission = %target.permission_id,
                    owner = %target.owner_email,
                    dry_run,
                    "delete permission"
                );
                if dry_run {
                    RevocationStatus::DryRun
                } else {
                    match drive
                        .delete_permission(&target.owner_email, &target.file_id, &target.permission_id)
                        .await
                    {
                        Ok(()) => RevocationStatus::Revoked,
                        Err(e) => {
                            tracing::warn!(file = %target.file_id, error = %e, "error deleting permission");
                            RevocationStatus::Failed(e.to_string())
                        }
                    }
                }
            };
            report.outcomes.push(RevocationOutcome {
                target: target.clone(),
                status,
            });
        }
    }
    report
}
