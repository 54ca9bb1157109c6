mod records;
mod source;

pub use records::{PostStyleRecord, StyleCharacteristics, TopicRecord};
pub use source::{KnowledgeBase, KnowledgeError, KnowledgeSource};
