use postloop_llm::{CompletionOptions, LlmError, TextGenerator};
use tracing::{debug, info};

use crate::{CriticPrompts, CritiqueParseError, CritiqueResult};

/// Evaluator that scores drafts against the critique rubric
pub struct Critic<'a> {
    model: &'a dyn TextGenerator,
}

impl<'a> Critic<'a> {
    pub fn new(model: &'a dyn TextGenerator) -> Self {
        Self { model }
    }

    pub fn completion_options() -> CompletionOptions {
        CompletionOptions::with_temperature(0.2).max_tokens(1000)
    }

    /// Score a draft. `previous_feedback` is the guidance the generator was
    /// given for this draft, passed along for context.
    pub async fn critique(
        &self,
        draft: &str,
        previous_feedback: Option<&str>,
    ) -> Result<CritiqueResult, CritiqueError> {
        if draft.trim().is_empty() {
            return Err(CritiqueError::EmptyDraft);
        }

        let prompt = CriticPrompts::build_evaluation_prompt(draft, previous_feedback);
        debug!(
            prompt_len = prompt.len(),
            has_feedback = previous_feedback.is_some(),
            "Running critique"
        );

        let raw = self
            .model
            .complete(
                &CriticPrompts::system_prompt(),
                &prompt,
                &Self::completion_options(),
            )
            .await?;

        let result = CritiqueResult::parse(&raw)?;
        info!(
            overall = result.overall_score,
            approved = result.approved,
            verdict = %result.verdict,
            issues = result.issues.len(),
            "Critique completed"
        );
        Ok(result)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error("Cannot critique an empty draft")]
    EmptyDraft,

    #[error("Critique call failed: {0}")]
    Model(#[from] LlmError),

    #[error("Failed to parse critique: {0}")]
    Parse(#[from] CritiqueParseError),
}
