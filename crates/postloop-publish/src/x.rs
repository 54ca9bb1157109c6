use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{OAuthCredentials, OAuthSigner, PostId, PublishError, Publisher};

/// Production X API endpoint
pub const X_API_BASE: &str = "https://api.x.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CreatePostRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreatePostResponse {
    data: Option<CreatedPost>,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: String,
}

/// Publishes through `POST /2/tweets` with OAuth 1.0a user context
pub struct XPublisher {
    api_base: String,
    signer: OAuthSigner,
    http: reqwest::Client,
}

impl XPublisher {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self::with_signer(OAuthSigner::new(credentials))
    }

    pub fn with_signer(signer: OAuthSigner) -> Self {
        Self {
            api_base: X_API_BASE.to_string(),
            signer,
            http: reqwest::Client::new(),
        }
    }

    /// Credentials from `CONSUMER_KEY`, `CONSUMER_KEY_SECRET`, `ACCESS_TOKEN`
    /// and `ACCESS_TOKEN_SECRET`
    pub fn from_env() -> Result<Self, PublishError> {
        Ok(Self::new(OAuthCredentials::from_env()?))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/2/tweets", self.api_base)
    }
}

#[async_trait]
impl Publisher for XPublisher {
    fn name(&self) -> &str {
        "x"
    }

    async fn publish(&self, text: &str) -> Result<PostId, PublishError> {
        let url = self.endpoint();
        // JSON bodies are not part of the OAuth signature
        let authorization = self.signer.authorization_header("POST", &url, &[]);
        debug!(url = %url, characters = text.chars().count(), "Publishing post");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .timeout(REQUEST_TIMEOUT)
            .json(&CreatePostRequest { text })
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Post rejected");
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatePostResponse = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;
        let id = created
            .data
            .map(|d| d.id)
            .ok_or_else(|| PublishError::InvalidResponse("missing data.id".into()))?;

        info!(post_id = %id, "Post published");
        Ok(PostId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_token_secret: "ats".into(),
        }
    }

    #[tokio::test]
    async fn test_publish_returns_post_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2/tweets")
            .match_header(
                "authorization",
                Matcher::Regex(
                    r#"^OAuth oauth_consumer_key="ck", oauth_nonce="[A-Za-z0-9]{32}""#.into(),
                ),
            )
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({"text": "shipping today"})))
            .with_status(201)
            .with_body(r#"{"data":{"id":"1790","text":"shipping today"}}"#)
            .create_async()
            .await;

        let publisher = XPublisher::new(credentials()).with_api_base(server.url());
        let id = publisher.publish("shipping today").await.unwrap();

        assert_eq!(id, PostId("1790".into()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/2/tweets")
            .with_status(403)
            .with_body(r#"{"detail":"duplicate content"}"#)
            .create_async()
            .await;

        let publisher = XPublisher::new(credentials()).with_api_base(server.url());
        let err = publisher.publish("again").await.unwrap_err();

        match err {
            PublishError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("duplicate content"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_id_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/2/tweets")
            .with_status(200)
            .with_body(r#"{"errors":[]}"#)
            .create_async()
            .await;

        let publisher = XPublisher::new(credentials()).with_api_base(server.url());
        let err = publisher.publish("hi").await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let publisher = XPublisher::new(credentials()).with_api_base("http://127.0.0.1:9");
        let err = publisher.publish("hi").await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }
}
