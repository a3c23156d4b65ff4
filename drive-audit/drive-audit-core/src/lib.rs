pub mod capture;
pub mod config;
pub mod error;
pub mod google;
pub mod graph;
pub mod model;
pub mod normalize;
pub mod report;
pub mod revocation;
pub mod service;
pub mod store;

pub use error::{AuditError, DriveError, Result};
pub use model::{FileRecord, Identity, PermissionRecord, RevocationTarget, Snapshot};
