use thiserror::Error;

/// Failures raised by the external directory and drive services.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The caller may not read this file's permission details.
    #[error("insufficient file permissions: {0}")]
    InsufficientPermission(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid credentials: {0}")]
    Credentials(String),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("unable to retrieve all files for {user} ({scope}): incomplete search")]
    IncompleteCapture { user: String, scope: String },
    #[error("did not get any file permissions: {file_id} - {name}")]
    MissingPermissions { file_id: String, name: String },
    #[error("parent cycle while resolving path of {file_id}: {repeated_id} visited twice")]
    CyclicParent { file_id: String, repeated_id: String },
    #[error(transparent)]
    Drive(#[from] DriveError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot format version {0}")]
    UnsupportedSnapshotVersion(u32),
}

pub type Result<T, E = AuditError> = std::result::Result<T, E>;
