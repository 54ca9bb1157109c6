use serde::{Deserialize, Deserializer, Serialize};

/// A subject a post can be written about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub topic: String,
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// A post format: structure, checklist and voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostStyleRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub type_id: String,
    pub name: String,
    pub description: String,
    /// Free-form structural template, rendered verbatim into the prompt
    #[serde(default)]
    pub structure: serde_json::Value,
    #[serde(default)]
    pub elements_to_include: Vec<String>,
    pub characteristics: StyleCharacteristics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCharacteristics {
    pub tone: String,
    pub length: String,
}

/// Record ids appear as both `"kb_1"` and `1` in hand-written knowledge files
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
