//! Google Workspace implementation of the directory and drive services.

pub mod auth;
pub mod client;

pub use auth::{ServiceAccountKey, ServiceAccountTokens, TokenSource};
pub use client::GoogleWorkspace;
