//! Flattens a snapshot into one row per (file, identity) pair.

use crate::error::Result;
use crate::graph::FileGraph;
use crate::model::{PermissionType, Role, Snapshot};
use std::io::Write;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRow {
    pub path: String,
    pub identity: String,
    pub role: Role,
    pub permission_type: PermissionType,
    pub permission_id: String,
    pub inherited: bool,
    pub mime_type: String,
    pub url: String,
}

pub const CSV_HEADER: [&str; 8] = [
    "File name",
    "Role",
    "Permission Type",
    "Person",
    "Permission ID",
    "Inherited Permission",
    "Type",
    "URL",
];

/// Rows of `graph`'s snapshot, produced lazily in file-id then identity order.
/// A file whose path cannot be resolved yields a single error item.
pub fn rows<'g>(
    snapshot: &'g Snapshot,
    graph: &'g FileGraph<'g>,
) -> impl Iterator<Item = Result<ReportRow>> + 'g {
    snapshot
        .files()
        .filter(|file| !file.permissions.is_empty())
        .flat_map(move |file| {
            let rows: Vec<Result<ReportRow>> = match graph.resolve(&file.id) {
                Some(Ok(path)) => file
                    .permissions
                    .iter()
                    .map(|(identity, perm)| {
                        Ok(ReportRow {
                            path: path.to_string(),
                            identity: identity.clone(),
                            role: perm.role,
                            permission_type: perm.permission_type,
                            permission_id: perm.id.clone(),
                            inherited: perm.inherited,
                            mime_type: file.mime_type.clone(),
                            url: file.open_url.clone(),
                        })
                    })
                    .collect(),
                Some(Err(e)) => vec![Err(e)],
                None => Vec::new(),
            };
            rows
        })
}

/// Render `snapshot` as CSV with CRLF line endings. Stops at the first path
/// that cannot be resolved.
pub fn write_csv<W: Write>(snapshot: &Snapshot, out: W) -> Result<usize> {
    let graph = FileGraph::new(snapshot);
    let mut writer = CsvWriter::new(out);
    writer.write_record(CSV_HEADER)?;
    let mut written = 0;
    for row in rows(snapshot, &graph) {
        let row = row?;
        writer.write_record([
            row.path.as_str(),
            row.role.as_str(),
            row.permission_type.as_str(),
            row.identity.as_str(),
            row.permission_id.as_str(),
            yes_no(row.inherited),
            row.mime_type.as_str(),
            row.url.as_str(),
        ])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "YES"
    } else {
        "NO"
    }
}

struct CsvWriter<W: Write> {
    out: W,
}

impl<W: Write> CsvWriter<W> {
    fn new(out: W) -> Self {
        Self { out }
    }

    fn write_record<'f>(&mut self, fields: impl IntoIterator<Item = &'f str>) -> std::io::Result<()> {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.out.write_all(b",")?;
            }
            if field.contains([',', '"', '\r', '\n']) || field.starts_with(' ') || field.ends_with(' ') {
                self.out.write_all(b"\"")?;
                self.out.write_all(field.replace('"', "\"\"").as_bytes())?;
                self.out.write_all(b"\"")?;
            } else {
                self.out.write_all(field.as_bytes())?;
            }
        }
        self.out.write_all(b"\r\n")
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}
