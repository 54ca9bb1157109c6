mod generator;
mod prompts;

pub use generator::{DraftPost, GenerationError, Generator};
pub use prompts::GeneratorPrompts;
