use postloop_knowledge::{PostStyleRecord, TopicRecord};

/// Prompt templates for the generator
pub struct GeneratorPrompts;

impl GeneratorPrompts {
    pub fn system_prompt() -> &'static str {
        r#"You are an expert AI content creator specializing in Twitter posts about AI engineering and production systems. Your tweets are:
- Technically accurate
- Engaging and thought-provoking
- Written in a conversational tone
- Include relevant emojis sparingly
- NO hashtags unless specifically requested

Generate ONLY the tweet text, nothing else."#
    }

    /// Build the generation instruction for a topic and post style.
    ///
    /// Blank feedback is treated as absent.
    pub fn build_generation_prompt(
        topic: &TopicRecord,
        style: &PostStyleRecord,
        feedback: Option<&str>,
    ) -> String {
        let structure = serde_json::to_string_pretty(&style.structure)
            .unwrap_or_else(|_| style.structure.to_string());

        let mut prompt = format!(
            r#"Create a Twitter post using this knowledge and structure:

KNOWLEDGE BASE:
Topic: {topic}
Content: {content}
Key Points: {key_points}

POST TYPE: {style_name}
Description: {description}
Structure: {structure}
Tone: {tone}
Length: {length}

Elements to include:
{elements}

Generate a compelling tweet that follows the "{style_name}" format and incorporates the knowledge about "{topic}""#,
            topic = topic.topic,
            content = topic.content,
            key_points = topic.key_points.join(", "),
            style_name = style.name,
            description = style.description,
            structure = structure,
            tone = style.characteristics.tone,
            length = style.characteristics.length,
            elements = style.elements_to_include.join("\n"),
        );

        if let Some(feedback) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
            prompt.push_str(&Self::build_revision_directive(feedback));
        }

        prompt
    }

    fn build_revision_directive(feedback: &str) -> String {
        format!(
            r#"

## REQUIRED REVISION
An editor rejected the previous draft. You MUST apply these changes in the new tweet:
{feedback}

Do not mention the feedback or the previous draft. Output only the revised tweet."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postloop_knowledge::StyleCharacteristics;

    fn topic() -> TopicRecord {
        TopicRecord {
            id: "kb_7".into(),
            topic: "Eval drift".into(),
            content: "Offline evals stop matching production traffic.".into(),
            key_points: vec!["sample live traffic".into(), "re-label monthly".into()],
        }
    }

    fn style() -> PostStyleRecord {
        PostStyleRecord {
            type_id: "contrarian".into(),
            name: "Contrarian Take".into(),
            description: "Push back on a popular belief".into(),
            structure: serde_json::json!({"hook": "the belief", "turn": "why it fails"}),
            elements_to_include: vec!["a number".into(), "a caveat".into()],
            characteristics: StyleCharacteristics {
                tone: "direct".into(),
                length: "short".into(),
            },
        }
    }

    #[test]
    fn test_prompt_includes_topic_and_style() {
        let prompt = GeneratorPrompts::build_generation_prompt(&topic(), &style(), None);
        assert!(prompt.contains("Topic: Eval drift"));
        assert!(prompt.contains("Key Points: sample live traffic, re-label monthly"));
        assert!(prompt.contains("POST TYPE: Contrarian Take"));
        assert!(prompt.contains("\"hook\": \"the belief\""));
        assert!(prompt.contains("Tone: direct"));
        assert!(prompt.contains("a number\na caveat"));
        assert!(!prompt.contains("REQUIRED REVISION"));
    }

    #[test]
    fn test_feedback_appended_after_base_instruction() {
        let prompt = GeneratorPrompts::build_generation_prompt(
            &topic(),
            &style(),
            Some("Cut the second emoji."),
        );
        let base_end = prompt.find("incorporates the knowledge").unwrap();
        let directive = prompt.find("REQUIRED REVISION").unwrap();
        assert!(directive > base_end);
        assert!(prompt.ends_with("Output only the revised tweet."));
        assert!(prompt.contains("Cut the second emoji."));
    }

    #[test]
    fn test_blank_feedback_ignored() {
        let with_blank = GeneratorPrompts::build_generation_prompt(&topic(), &style(), Some("  "));
        let without = GeneratorPrompts::build_generation_prompt(&topic(), &style(), None);
        assert_eq!(with_blank, without);
    }
}
