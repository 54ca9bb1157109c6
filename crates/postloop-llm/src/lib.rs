//! # postloop-llm
//!
//! Text-generation capability shared by the generator and the critic.
//!
//! - [`TextGenerator`] - the `complete(system, user, options)` seam
//! - [`OllamaClient`] - HTTP implementation against an Ollama server
//! - [`CompletionOptions`] - per-call sampling parameters

mod ollama;
#[cfg(any(test, feature = "testing"))]
mod scripted;
mod traits;

pub use ollama::{OllamaClient, OLLAMA_DEFAULT_HOST, OLLAMA_DEFAULT_MODEL};
#[cfg(any(test, feature = "testing"))]
pub use scripted::{RecordedCall, ScriptedGenerator};
pub use traits::{CompletionOptions, LlmError, TextGenerator};
