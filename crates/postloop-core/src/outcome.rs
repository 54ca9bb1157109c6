use serde::{Deserialize, Serialize};

use postloop_critic::CritiqueResult;
use postloop_generator::DraftPost;

use crate::IterationRecord;

/// Why a run reached DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The critic approved the latest draft
    Approved,
    /// The iteration ceiling was hit without approval
    IterationCeiling,
}

/// The final result of a refinement run. An unapproved outcome is not an
/// error; callers decide whether to publish it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub draft: DraftPost,
    pub critique: CritiqueResult,
    pub approved: bool,
    pub iterations: usize,
    pub termination: Termination,
    pub history: Vec<IterationRecord>,
    pub total_duration_secs: f64,
}

impl RunOutcome {
    pub fn text(&self) -> &str {
        &self.draft.text
    }
}
