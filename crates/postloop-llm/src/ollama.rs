use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{CompletionOptions, LlmError, TextGenerator};

/// Default Ollama API endpoint
pub const OLLAMA_DEFAULT_HOST: &str = "http://localhost:11434";

/// Default model when none is configured
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2:3b";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama text-generation backend over its HTTP API
pub struct OllamaClient {
    host: String,
    model: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Models installed on the backend
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed { status, body });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Model family without the tag ("llama3.2:3b" -> "llama3.2")
    fn model_family(&self) -> &str {
        self.model.split(':').next().unwrap_or(&self.model)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Unavailable(format!("{}: {}", self.host, err))
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(OLLAMA_DEFAULT_HOST, OLLAMA_DEFAULT_MODEL)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        debug!(
            model = %self.model,
            system_len = system_prompt.len(),
            prompt_len = user_prompt.len(),
            temperature = options.temperature,
            "Requesting completion"
        );

        let request = GenerateRequest {
            model: &self.model,
            prompt: user_prompt,
            system: system_prompt,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.host);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed { status, body });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        debug!(response_len = body.response.len(), "Completion received");
        Ok(body.response)
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => {
                let family = self.model_family();
                let found = models.iter().any(|name| name.contains(family));
                if !found {
                    warn!(
                        model = %self.model,
                        available = %models.join(", "),
                        "Model not installed on backend"
                    );
                }
                found
            }
            Err(e) => {
                warn!(error = %e, "Backend health check failed");
                false
            }
        }
    }
}
