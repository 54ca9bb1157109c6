use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use postloop_knowledge::{PostStyleRecord, TopicRecord};
use postloop_llm::{CompletionOptions, LlmError, TextGenerator};

use crate::GeneratorPrompts;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Text generation failed: {0}")]
    Model(#[from] LlmError),

    #[error("Text generation returned an empty draft")]
    EmptyResponse,
}

/// One generated candidate post and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPost {
    pub text: String,
    pub character_count: usize,
    pub topic_id: String,
    pub topic: String,
    pub style_id: String,
    pub style_name: String,
    pub generated_at: DateTime<Utc>,
    /// 1-based iteration of the run that produced this draft
    pub iteration: usize,
}

impl DraftPost {
    pub fn new(
        text: String,
        topic: &TopicRecord,
        style: &PostStyleRecord,
        iteration: usize,
    ) -> Self {
        Self {
            character_count: text.chars().count(),
            text,
            topic_id: topic.id.clone(),
            topic: topic.topic.clone(),
            style_id: style.type_id.clone(),
            style_name: style.name.clone(),
            generated_at: Utc::now(),
            iteration,
        }
    }
}

/// Writes drafts through a text-generation backend
pub struct Generator<'a> {
    model: &'a dyn TextGenerator,
}

impl<'a> Generator<'a> {
    pub fn new(model: &'a dyn TextGenerator) -> Self {
        Self { model }
    }

    pub fn completion_options() -> CompletionOptions {
        CompletionOptions::with_temperature(0.7)
            .top_p(0.9)
            .max_tokens(1000)
    }

    /// Generate a draft for `iteration`. `feedback` is the previous critique's
    /// rewrite direction, never the whole critique.
    pub async fn generate(
        &self,
        topic: &TopicRecord,
        style: &PostStyleRecord,
        feedback: Option<&str>,
        iteration: usize,
    ) -> Result<DraftPost, GenerationError> {
        let prompt = GeneratorPrompts::build_generation_prompt(topic, style, feedback);

        debug!(
            iteration,
            topic = %topic.topic,
            style = %style.name,
            has_feedback = feedback.is_some(),
            prompt_len = prompt.len(),
            "Generating draft"
        );

        let raw = self
            .model
            .complete(
                GeneratorPrompts::system_prompt(),
                &prompt,
                &Self::completion_options(),
            )
            .await?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        let draft = DraftPost::new(text.to_string(), topic, style, iteration);
        info!(
            iteration,
            characters = draft.character_count,
            "Draft generated"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postloop_knowledge::StyleCharacteristics;
    use postloop_llm::ScriptedGenerator;

    fn topic() -> TopicRecord {
        TopicRecord {
            id: "kb_1".into(),
            topic: "Latency budgets".into(),
            content: "p99 matters more than p50 for agents.".into(),
            key_points: vec!["tail latency compounds".into()],
        }
    }

    fn style() -> PostStyleRecord {
        PostStyleRecord {
            type_id: "list".into(),
            name: "Quick List".into(),
            description: "Three tight bullets".into(),
            structure: serde_json::Value::Null,
            elements_to_include: vec![],
            characteristics: StyleCharacteristics {
                tone: "practical".into(),
                length: "short".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_generate_trims_and_derives_metadata() {
        let model = ScriptedGenerator::new(["\n  Tail latency eats agents alive 🐢  \n"]);
        let generator = Generator::new(&model);

        let draft = generator.generate(&topic(), &style(), None, 1).await.unwrap();

        assert_eq!(draft.text, "Tail latency eats agents alive 🐢");
        assert_eq!(draft.character_count, 32);
        assert_eq!(draft.topic_id, "kb_1");
        assert_eq!(draft.style_name, "Quick List");
        assert_eq!(draft.iteration, 1);

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].options, Generator::completion_options());
        assert!(calls[0].system_prompt.contains("Generate ONLY the tweet text"));
    }

    #[tokio::test]
    async fn test_feedback_reaches_prompt() {
        let model = ScriptedGenerator::new(["revised"]);
        let generator = Generator::new(&model);

        generator
            .generate(&topic(), &style(), Some("Open with the p99 number."), 2)
            .await
            .unwrap();

        assert!(model.calls()[0]
            .user_prompt
            .contains("Open with the p99 number."));
    }

    #[tokio::test]
    async fn test_empty_response_is_generation_failure() {
        let model = ScriptedGenerator::new(["   \n "]);
        let generator = Generator::new(&model);

        let err = generator.generate(&topic(), &style(), None, 1).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_backend_error_is_not_retried() {
        let model = ScriptedGenerator::new(Vec::<String>::new());
        model.push_error(LlmError::Unavailable("connection refused".into()));
        let generator = Generator::new(&model);

        let err = generator.generate(&topic(), &style(), None, 1).await.unwrap_err();
        assert!(matches!(err, GenerationError::Model(LlmError::Unavailable(_))));
        assert_eq!(model.call_count(), 1);
    }
}
