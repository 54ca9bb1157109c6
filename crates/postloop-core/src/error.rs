use thiserror::Error;

use postloop_critic::CritiqueError;
use postloop_generator::GenerationError;
use postloop_llm::LlmError;

/// Terminal failure of a refinement run. Partial state is discarded.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Generation failed in iteration {iteration}: {source}")]
    Generation {
        iteration: usize,
        #[source]
        source: GenerationError,
    },

    #[error("Critique failed in iteration {iteration}: {source}")]
    Critique {
        iteration: usize,
        #[source]
        source: CritiqueError,
    },
}

impl RunError {
    /// Iteration the failure happened in (1-based)
    pub fn iteration(&self) -> usize {
        match self {
            RunError::Generation { iteration, .. } | RunError::Critique { iteration, .. } => {
                *iteration
            }
        }
    }

    /// The critic answered but no structured record could be decoded
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            RunError::Critique {
                source: CritiqueError::Parse(_),
                ..
            }
        )
    }

    /// The text-generation backend could not be reached
    pub fn is_unavailable(&self) -> bool {
        self.model_error().is_some_and(LlmError::is_unavailable)
    }

    pub fn model_error(&self) -> Option<&LlmError> {
        match self {
            RunError::Generation {
                source: GenerationError::Model(e),
                ..
            }
            | RunError::Critique {
                source: CritiqueError::Model(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}
