use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to a text-generation backend
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Text generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend returned {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// True when the backend could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LlmError::Unavailable(_) | LlmError::Timeout(_))
    }
}

/// Sampling options for a single completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: None,
            max_tokens: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The single capability both the generator and the critic depend on
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Produce a completion for the given system and user prompts
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// Pre-flight probe: is the backend reachable and the model installed?
    async fn is_available(&self) -> bool;
}
