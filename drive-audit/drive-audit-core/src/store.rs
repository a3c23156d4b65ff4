use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{AuditError, Result};
use crate::model::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;

/// On-disk envelope of a captured snapshot.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub format_version: u32,
    pub captured_at: DateTime<Utc>,
    pub files: Snapshot,
}

/// JSON file holding the latest capture.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `snapshot`, replacing any previous capture. The file is written
    /// next to the target and renamed into place, so readers never observe a
    /// half-written database.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let stored = StoredSnapshot {
            format_version: FORMAT_VERSION,
            captured_at: Utc::now(),
            files: snapshot.clone(),
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.tmp_path();
        let written = write_json(&tmp, &stored)
            .and_then(|()| std::fs::rename(&tmp, &self.path).map_err(AuditError::from));
        if let Err(e) = written {
            match std::fs::remove_file(&tmp) {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "could not remove partial snapshot");
                }
            }
            return Err(e);
        }
        tracing::info!(path = %self.path.display(), files = snapshot.len(), "snapshot saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Snapshot> {
        Ok(self.load_stored()?.files)
    }

    /// Load the snapshot together with its capture metadata.
    pub fn load_stored(&self) -> Result<StoredSnapshot> {
        let reader = BufReader::new(std::fs::File::open(&self.path)?);
        let stored: StoredSnapshot = serde_json::from_reader(reader)?;
        if stored.format_version != FORMAT_VERSION {
            return Err(AuditError::UnsupportedSnapshotVersion(stored.format_version));
        }
        tracing::debug!(
            path = %self.path.display(),
            files = stored.files.len(),
            captured_at = %stored.captured_at.to_rfc3339(),
            "snapshot loaded"
        );
        Ok(stored)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_json(path: &Path, stored: &StoredSnapshot) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer(&mut writer, stored)?;
    writer.flush()?;
    Ok(())
}
