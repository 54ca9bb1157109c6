use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Identifier the platform assigned to a published post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Missing credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("Publish request failed: {0}")]
    Transport(String),

    #[error("Platform rejected the post ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response from platform: {0}")]
    InvalidResponse(String),
}

/// Destination for finished posts
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, text: &str) -> Result<PostId, PublishError>;
}

/// Publisher that only logs. Ids are prefixed with `dry-run-`.
#[derive(Debug, Default)]
pub struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn publish(&self, text: &str) -> Result<PostId, PublishError> {
        let id = PostId(format!("dry-run-{}", uuid::Uuid::new_v4()));
        info!(post_id = %id, characters = text.chars().count(), "Dry run, not publishing");
        Ok(id)
    }
}

/// Stands in for a real publisher when credentials are missing, so the
/// server can start and report the problem per request
#[derive(Debug)]
pub struct UnconfiguredPublisher {
    missing: Vec<&'static str>,
}

impl UnconfiguredPublisher {
    pub fn new(missing: Vec<&'static str>) -> Self {
        Self { missing }
    }
}

#[async_trait]
impl Publisher for UnconfiguredPublisher {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn publish(&self, _text: &str) -> Result<PostId, PublishError> {
        Err(PublishError::MissingCredentials(self.missing.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_returns_synthetic_ids() {
        let publisher = DryRunPublisher;
        let a = publisher.publish("hello").await.unwrap();
        let b = publisher.publish("hello").await.unwrap();
        assert!(a.0.starts_with("dry-run-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unconfigured_publisher_always_fails() {
        let publisher = UnconfiguredPublisher::new(vec!["ACCESS_TOKEN"]);
        let err = publisher.publish("hello").await.unwrap_err();
        assert!(matches!(err, PublishError::MissingCredentials(ref m) if m == &["ACCESS_TOKEN"]));
    }

    #[test]
    fn test_missing_credentials_lists_variables() {
        let err = PublishError::MissingCredentials(vec!["ACCESS_TOKEN", "ACCESS_TOKEN_SECRET"]);
        assert_eq!(
            err.to_string(),
            "Missing credentials: ACCESS_TOKEN, ACCESS_TOKEN_SECRET"
        );
    }
}
