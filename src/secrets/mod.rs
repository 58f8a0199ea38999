//! Backend-agnostic secret management.
//!
//! Commands only forward to the backend; storage and encryption are the
//! backend's business.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecretError>;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("not supported by this backend: {0}")]
    Unsupported(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// A stored secret. The content is never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Secret {
    pub id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Input for [`SecretService::create_secret`].
#[derive(Clone)]
pub struct NewSecret {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for NewSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewSecret")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .finish()
    }
}

#[async_trait]
pub trait SecretService: Send + Sync {
    /// Store a new secret and return its identifier.
    async fn create_secret(&self, secret: NewSecret) -> Result<String>;

    async fn inspect_secret(&self, id: &str) -> Result<Secret>;

    async fn list_secrets(&self) -> Result<Vec<Secret>>;

    /// Delete a secret. `recover` keeps it restorable for the backend's
    /// recovery window, where the backend has one.
    async fn delete_secret(&self, id: &str, recover: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret_content() {
        let secret = NewSecret {
            name: "db-password".into(),
            labels: BTreeMap::new(),
            content: b"hunter2".to_vec(),
        };
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<7 bytes>"));
    }

    #[test]
    fn test_secret_serializes_without_missing_timestamp() {
        let secret = Secret {
            id: "abc".into(),
            name: "token".into(),
            labels: BTreeMap::from([("team".to_string(), "core".to_string())]),
            created_at: None,
        };
        let json = serde_json::to_value(&secret).unwrap();
        assert_eq!(json["labels"]["team"], "core");
        assert!(json.get("created_at").is_none());
    }
}
