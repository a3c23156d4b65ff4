use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_CREDENTIALS: &str = "credentials.json";
pub const DEFAULT_DATABASE: &str = "db.json";
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Largest page the Drive files endpoint accepts.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub domain: Option<String>,
    pub admin_email: Option<String>,
    /// Service account key obtained from the cloud console.
    pub credentials_path: PathBuf,
    pub database_path: PathBuf,
    pub max_concurrency: usize,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: None,
            admin_email: None,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Load from `DRIVE_AUDIT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            domain: var("DRIVE_AUDIT_DOMAIN"),
            admin_email: var("DRIVE_AUDIT_ADMIN_EMAIL"),
            credentials_path: var("DRIVE_AUDIT_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            database_path: var("DRIVE_AUDIT_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            max_concurrency: match var("DRIVE_AUDIT_CONCURRENCY") {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid DRIVE_AUDIT_CONCURRENCY: {v}"))?,
                None => defaults.max_concurrency,
            },
            page_size: match var("DRIVE_AUDIT_PAGE_SIZE") {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid DRIVE_AUDIT_PAGE_SIZE: {v}"))?,
                None => defaults.page_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database_path, PathBuf::from("db.json"));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DRIVE_AUDIT_DOMAIN", "x.com"),
            ("DRIVE_AUDIT_CONCURRENCY", "3"),
            ("DRIVE_AUDIT_DATABASE", "/tmp/audit.json"),
            ("DRIVE_AUDIT_ADMIN_EMAIL", "  "),
        ]))
        .unwrap();
        assert_eq!(config.domain.as_deref(), Some("x.com"));
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.database_path, PathBuf::from("/tmp/audit.json"));
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[("DRIVE_AUDIT_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("DRIVE_AUDIT_PAGE_SIZE"));
    }
}
