//! Service-account OAuth tokens with domain-wide delegation.

use crate::error::DriveError;
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
/// Tokens this close to expiry are refreshed rather than reused.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize, Clone, Debug)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DriveError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            DriveError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, DriveError> {
        serde_json::from_str(data).map_err(|e| DriveError::Credentials(e.to_string()))
    }
}

#[derive(Serialize, Debug)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Bearer tokens valid for acting as `subject` with `scope`.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, subject: &str, scope: &str) -> Result<String, DriveError>;
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    encoding: EncodingKey,
    client: reqwest::Client,
    cache: Mutex<HashMap<(String, String), CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self, DriveError> {
        let encoding = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DriveError::Credentials(format!("private key: {e}")))?;
        Ok(Self {
            key,
            encoding,
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn assertion(&self, subject: &str, scope: &str) -> Result<String, DriveError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::Credentials(e.to_string()))?
            .as_secs();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            sub: subject,
            scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME.as_secs(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding)
            .map_err(|e| DriveError::Credentials(format!("signing assertion: {e}")))
    }

    async fn fetch(&self, subject: &str, scope: &str) -> Result<CachedToken, DriveError> {
        let assertion = self.assertion(subject, scope)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(e) => match e.error_description {
                    Some(d) => format!("{}: {}", e.error, d),
                    None => e.error,
                },
                Err(_) => body,
            };
            return Err(DriveError::Authorization(format!(
                "token for {subject} ({status}): {message}"
            )));
        }
        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn token(&self, subject: &str, scope: &str) -> Result<String, DriveError> {
        let key = (subject.to_string(), scope.to_string());
        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.get(&key) {
            if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(cached.value.clone());
            }
        }
        tracing::debug!(subject, scope, "requesting access token");
        let fresh = self.fetch(subject, scope).await?;
        let value = fresh.value.clone();
        guard.insert(key, fresh);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"type": "service_account", "client_email": "svc@proj.iam.gserviceaccount.com", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(key.client_email, "svc@proj.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn malformed_key_is_credentials_error() {
        let err = ServiceAccountKey::from_json("{}").unwrap_err();
        assert!(matches!(err, DriveError::Credentials(_)));
    }

    #[test]
    fn missing_key_file_is_credentials_error() {
        let tempdir = tempfile::tempdir().unwrap();
        let err = ServiceAccountKey::from_file(tempdir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, DriveError::Credentials(_)));
    }

    #[test]
    fn rejects_invalid_private_key() {
        let key = ServiceAccountKey {
            client_email: "svc@x".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        let result = ServiceAccountTokens::new(key, reqwest::Client::new());
        assert!(matches!(result, Err(DriveError::Credentials(_))));
    }
}
