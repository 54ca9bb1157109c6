use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use postloop_critic::{CritiqueResult, Verdict};
use postloop_generator::DraftPost;
use postloop_knowledge::{PostStyleRecord, TopicRecord};

use crate::outcome::{RunOutcome, Termination};

/// Hard ceiling on generate/critique cycles per run
pub const MAX_ITERATIONS: usize = 3;

/// Phases of one refinement run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Start,
    Generating,
    Critiquing,
    Done,
}

/// How topic and style are chosen across the iterations of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceSelection {
    /// Fresh random draw on every generation, revisions included
    #[default]
    PerIteration,
    /// Draw once at iteration 1 and reuse for every revision of the run
    PinnedPerRun,
}

/// Summary of a completed iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub topic_id: String,
    pub style_id: String,
    /// Feedback the generator received for this iteration
    pub feedback: Option<String>,
    pub character_count: usize,
    pub overall_score: f64,
    pub approved: bool,
    pub verdict: Verdict,
    pub timestamp: DateTime<Utc>,
}

/// Mutable accumulator owned by a single run
#[derive(Debug)]
pub struct LoopState {
    phase: LoopPhase,
    iteration: usize,
    draft: Option<DraftPost>,
    critique: Option<CritiqueResult>,
    approved: bool,
    feedback: Option<String>,
    pinned: Option<(TopicRecord, PostStyleRecord)>,
    history: Vec<IterationRecord>,
    started_at: Instant,
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopState {
    pub fn new() -> Self {
        Self {
            phase: LoopPhase::Start,
            iteration: 0,
            draft: None,
            critique: None,
            approved: false,
            feedback: None,
            pinned: None,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Iteration number the next draft will carry
    pub fn next_iteration(&self) -> usize {
        self.iteration + 1
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    /// Rewrite direction from the most recent critique, if any
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn draft(&self) -> Option<&DraftPost> {
        self.draft.as_ref()
    }

    pub fn critique(&self) -> Option<&CritiqueResult> {
        self.critique.as_ref()
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn pinned_sources(&self) -> Option<&(TopicRecord, PostStyleRecord)> {
        self.pinned.as_ref()
    }

    pub fn pin_sources(&mut self, topic: TopicRecord, style: PostStyleRecord) {
        self.pinned = Some((topic, style));
    }

    /// START -> GENERATING
    pub fn begin(&mut self) {
        debug_assert_eq!(self.phase, LoopPhase::Start);
        self.phase = LoopPhase::Generating;
    }

    /// GENERATING -> CRITIQUING. Supersedes the previous draft and drops the
    /// critique that belonged to it.
    pub fn record_draft(&mut self, draft: DraftPost) {
        debug_assert_eq!(self.phase, LoopPhase::Generating);
        self.iteration += 1;
        self.draft = Some(draft);
        self.critique = None;
        self.phase = LoopPhase::Critiquing;
    }

    /// CRITIQUING -> DONE when approved or at the ceiling, otherwise back to
    /// GENERATING with this critique's rewrite direction as the only feedback.
    pub fn record_critique(&mut self, critique: CritiqueResult) -> LoopPhase {
        debug_assert_eq!(self.phase, LoopPhase::Critiquing);

        if let Some(draft) = &self.draft {
            self.history.push(IterationRecord {
                iteration: self.iteration,
                topic_id: draft.topic_id.clone(),
                style_id: draft.style_id.clone(),
                feedback: self.feedback.clone(),
                character_count: draft.character_count,
                overall_score: critique.overall_score,
                approved: critique.approved,
                verdict: critique.verdict,
                timestamp: Utc::now(),
            });
        }

        self.approved = critique.approved;
        self.phase = if self.approved || self.iteration >= MAX_ITERATIONS {
            LoopPhase::Done
        } else {
            self.feedback = Some(critique.rewrite_direction.clone());
            LoopPhase::Generating
        };
        self.critique = Some(critique);
        self.phase
    }

    /// Final result, available once the run reached DONE
    pub fn into_outcome(self) -> Option<RunOutcome> {
        if self.phase != LoopPhase::Done {
            return None;
        }
        let duration = self.started_at.elapsed();
        let draft = self.draft?;
        let critique = self.critique?;
        let termination = if self.approved {
            Termination::Approved
        } else {
            Termination::IterationCeiling
        };

        Some(RunOutcome {
            draft,
            critique,
            approved: self.approved,
            iterations: self.iteration,
            termination,
            history: self.history,
            total_duration_secs: duration.as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postloop_knowledge::StyleCharacteristics;

    fn draft(iteration: usize) -> DraftPost {
        let topic = TopicRecord {
            id: "t".into(),
            topic: "Topic".into(),
            content: String::new(),
            key_points: vec![],
        };
        let style = PostStyleRecord {
            type_id: "s".into(),
            name: "Style".into(),
            description: String::new(),
            structure: serde_json::Value::Null,
            elements_to_include: vec![],
            characteristics: StyleCharacteristics {
                tone: "plain".into(),
                length: "short".into(),
            },
        };
        DraftPost::new(format!("draft {iteration}"), &topic, &style, iteration)
    }

    fn critique(approved: bool, direction: &str) -> CritiqueResult {
        let score = if approved { 8.0 } else { 5.0 };
        CritiqueResult {
            authenticity_score: score,
            hook_score: score,
            formatting_score: score,
            content_value_score: score,
            overall_score: score,
            approved,
            verdict: if approved {
                Verdict::Approve
            } else {
                Verdict::Revise
            },
            issues: vec![],
            rewrite_direction: direction.to_string(),
        }
    }

    #[test]
    fn test_initial_state() {
        let state = LoopState::new();
        assert_eq!(state.phase(), LoopPhase::Start);
        assert_eq!(state.iteration(), 0);
        assert!(state.draft().is_none());
        assert!(state.critique().is_none());
        assert!(!state.approved());
        assert!(state.into_outcome().is_none());
    }

    #[test]
    fn test_draft_increments_iteration_and_clears_stale_critique() {
        let mut state = LoopState::new();
        state.begin();
        state.record_draft(draft(1));
        assert_eq!(state.iteration(), 1);
        assert_eq!(state.phase(), LoopPhase::Critiquing);

        assert_eq!(
            state.record_critique(critique(false, "fix hook")),
            LoopPhase::Generating
        );
        assert_eq!(state.feedback(), Some("fix hook"));

        state.record_draft(draft(2));
        assert_eq!(state.iteration(), 2);
        assert!(state.critique().is_none());
    }

    #[test]
    fn test_approval_ends_run() {
        let mut state = LoopState::new();
        state.begin();
        state.record_draft(draft(1));
        assert_eq!(state.record_critique(critique(true, "")), LoopPhase::Done);

        let outcome = state.into_outcome().unwrap();
        assert!(outcome.approved);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.termination, Termination::Approved);
        assert_eq!(outcome.draft.iteration, outcome.history[0].iteration);
    }

    #[test]
    fn test_ceiling_ends_run_without_approval() {
        let mut state = LoopState::new();
        state.begin();
        for i in 1..=MAX_ITERATIONS {
            state.record_draft(draft(i));
            let next = state.record_critique(critique(false, &format!("direction {i}")));
            if i < MAX_ITERATIONS {
                assert_eq!(next, LoopPhase::Generating);
                assert_eq!(state.feedback(), Some(format!("direction {i}").as_str()));
            } else {
                assert_eq!(next, LoopPhase::Done);
            }
        }

        let outcome = state.into_outcome().unwrap();
        assert!(!outcome.approved);
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(outcome.termination, Termination::IterationCeiling);
        assert_eq!(outcome.draft.text, "draft 3");
        assert_eq!(outcome.critique.rewrite_direction, "direction 3");
    }

    #[test]
    fn test_history_records_feedback_received() {
        let mut state = LoopState::new();
        state.begin();
        state.record_draft(draft(1));
        state.record_critique(critique(false, "first"));
        state.record_draft(draft(2));
        state.record_critique(critique(false, "second"));
        state.record_draft(draft(3));
        state.record_critique(critique(true, ""));

        let feedback: Vec<Option<&str>> = state
            .history()
            .iter()
            .map(|r| r.feedback.as_deref())
            .collect();
        assert_eq!(feedback, vec![None, Some("first"), Some("second")]);
    }
}
