use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::{PostStyleRecord, TopicRecord};

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge base {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse knowledge base: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Knowledge base has no {0}")]
    Empty(&'static str),
}

/// Read-only supply of topics and post styles
pub trait KnowledgeSource: Send + Sync {
    /// Uniform random draw from the topic corpus
    fn pick_topic(&self) -> TopicRecord;

    /// Uniform random draw from the post-style corpus
    fn pick_style(&self) -> PostStyleRecord;
}

#[derive(Deserialize)]
struct KnowledgeFile {
    knowledge_base: Vec<TopicRecord>,
    twitter_post_types: Vec<PostStyleRecord>,
}

/// In-memory corpus loaded from a JSON knowledge-base file
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    topics: Vec<TopicRecord>,
    styles: Vec<PostStyleRecord>,
}

impl KnowledgeBase {
    /// Build from records; both lists must be non-empty so picks never fail
    pub fn new(
        topics: Vec<TopicRecord>,
        styles: Vec<PostStyleRecord>,
    ) -> Result<Self, KnowledgeError> {
        if topics.is_empty() {
            return Err(KnowledgeError::Empty("topics"));
        }
        if styles.is_empty() {
            return Err(KnowledgeError::Empty("post styles"));
        }
        Ok(Self { topics, styles })
    }

    pub fn from_json(json: &str) -> Result<Self, KnowledgeError> {
        let file: KnowledgeFile = serde_json::from_str(json)?;
        Self::new(file.knowledge_base, file.twitter_post_types)
    }

    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let content = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            topics = kb.topics.len(),
            styles = kb.styles.len(),
            "Loaded knowledge base"
        );
        Ok(kb)
    }

    pub fn topics(&self) -> &[TopicRecord] {
        &self.topics
    }

    pub fn styles(&self) -> &[PostStyleRecord] {
        &self.styles
    }
}

impl KnowledgeSource for KnowledgeBase {
    fn pick_topic(&self) -> TopicRecord {
        // Non-empty is enforced in `new`
        self.topics
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.topics[0].clone())
    }

    fn pick_style(&self) -> PostStyleRecord {
        self.styles
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.styles[0].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "knowledge_base": [
            {"id": "kb_1", "topic": "RAG evaluation", "content": "Measure retrieval separately.", "key_points": ["recall@k", "faithfulness"]},
            {"id": 2, "topic": "Prompt caching", "content": "Cache stable prefixes.", "key_points": []}
        ],
        "twitter_post_types": [
            {
                "type_id": "lesson",
                "name": "Lesson Learned",
                "description": "A mistake and what it taught you",
                "structure": {"hook": "the mistake", "body": "what happened", "close": "the lesson"},
                "elements_to_include": ["a concrete number", "one tool name"],
                "characteristics": {"tone": "candid", "length": "medium"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_knowledge_base() {
        let kb = KnowledgeBase::from_json(SAMPLE).unwrap();
        assert_eq!(kb.topics().len(), 2);
        assert_eq!(kb.topics()[1].id, "2");
        assert_eq!(kb.styles()[0].characteristics.tone, "candid");
        assert_eq!(kb.styles()[0].elements_to_include.len(), 2);
    }

    #[test]
    fn test_picks_come_from_corpus() {
        let kb = KnowledgeBase::from_json(SAMPLE).unwrap();
        for _ in 0..20 {
            let topic = kb.pick_topic();
            assert!(kb.topics().contains(&topic));
            assert_eq!(kb.pick_style().type_id, "lesson");
        }
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let json = r#"{"knowledge_base": [], "twitter_post_types": []}"#;
        assert!(matches!(
            KnowledgeBase::from_json(json),
            Err(KnowledgeError::Empty("topics"))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let kb = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.topics()[0].topic, "RAG evaluation");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = KnowledgeBase::load(Path::new("/nonexistent/kb.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/kb.json"));
    }

    #[test]
    fn test_bundled_knowledge_base_parses() {
        let kb = KnowledgeBase::from_json(include_str!("../../../knowledge_base.json")).unwrap();
        assert_eq!(kb.topics().len(), 3);
        assert_eq!(kb.styles().len(), 3);
        assert_eq!(kb.topics()[0].id, "1");
        assert!(kb.styles().iter().all(|s| !s.elements_to_include.is_empty()));
    }
}
