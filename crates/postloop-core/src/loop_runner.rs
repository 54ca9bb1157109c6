use std::sync::Arc;
use tracing::{debug, info, warn};

use postloop_critic::Critic;
use postloop_generator::Generator;
use postloop_knowledge::{KnowledgeSource, PostStyleRecord, TopicRecord};
use postloop_llm::TextGenerator;
use postloop_logging::{LogEvent, Logger};

use crate::error::RunError;
use crate::outcome::RunOutcome;
use crate::state::{LoopPhase, LoopState, SourceSelection, MAX_ITERATIONS};

const PREVIEW_CHARS: usize = 280;

/// Orchestrates the generate-critique loop
pub struct RefinementLoop<'a> {
    generator_model: &'a dyn TextGenerator,
    critic_model: &'a dyn TextGenerator,
    knowledge: &'a dyn KnowledgeSource,
    logger: Arc<Logger>,
    selection: SourceSelection,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(
        generator_model: &'a dyn TextGenerator,
        critic_model: &'a dyn TextGenerator,
        knowledge: &'a dyn KnowledgeSource,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator_model,
            critic_model,
            knowledge,
            logger,
            selection: SourceSelection::default(),
        }
    }

    pub fn with_source_selection(mut self, selection: SourceSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Run one refinement loop from START to DONE
    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        self.run_numbered(1).await
    }

    /// Run one loop, labelled `run` in log output
    pub async fn run_numbered(&self, run: usize) -> Result<RunOutcome, RunError> {
        self.logger.log(&LogEvent::RunStarted {
            run,
            max_iterations: MAX_ITERATIONS,
        });

        match self.drive(LoopState::new()).await {
            Ok(outcome) => {
                if !outcome.approved {
                    self.logger.log(&LogEvent::IterationCeilingReached {
                        iterations: outcome.iterations,
                    });
                }
                self.logger.log(&LogEvent::RunCompleted {
                    iterations: outcome.iterations,
                    approved: outcome.approved,
                    overall_score: outcome.critique.overall_score,
                    duration_secs: outcome.total_duration_secs,
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Run aborted");
                self.logger.log(&LogEvent::RunFailed {
                    iteration: e.iteration(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, mut state: LoopState) -> Result<RunOutcome, RunError> {
        let generator = Generator::new(self.generator_model);
        let critic = Critic::new(self.critic_model);

        loop {
            match state.phase() {
                LoopPhase::Start => state.begin(),
                LoopPhase::Generating => {
                    let iteration = state.next_iteration();
                    let (topic, style) = self.select_sources(&mut state);

                    self.logger.log(&LogEvent::GenerationStarted {
                        iteration,
                        topic: topic.topic.clone(),
                        style: style.name.clone(),
                        revision: state.feedback().is_some(),
                    });

                    let draft = generator
                        .generate(&topic, &style, state.feedback(), iteration)
                        .await
                        .map_err(|source| RunError::Generation { iteration, source })?;

                    self.logger.log(&LogEvent::DraftGenerated {
                        iteration,
                        characters: draft.character_count,
                        preview: draft.text.chars().take(PREVIEW_CHARS).collect(),
                    });
                    state.record_draft(draft);
                }
                LoopPhase::Critiquing => {
                    let iteration = state.iteration();
                    self.logger.log(&LogEvent::CritiqueStarted { iteration });

                    let text = state.draft().map(|d| d.text.as_str()).unwrap_or_default();
                    let critique = critic
                        .critique(text, state.feedback())
                        .await
                        .map_err(|source| RunError::Critique { iteration, source })?;

                    self.logger.log(&LogEvent::CritiqueCompleted {
                        iteration,
                        overall_score: critique.overall_score,
                        approved: critique.approved,
                        verdict: critique.verdict.to_string(),
                        issues: critique.issues.len(),
                    });

                    if state.record_critique(critique) == LoopPhase::Generating {
                        let direction = state.feedback().unwrap_or_default().to_string();
                        info!(iteration, "Revision requested");
                        self.logger.log(&LogEvent::RevisionRequested {
                            iteration,
                            rewrite_direction: direction,
                        });
                    }
                }
                LoopPhase::Done => break,
            }
        }

        debug!(
            iterations = state.iteration(),
            approved = state.approved(),
            "Run reached DONE"
        );
        // DONE is only reached after a draft and its critique were recorded
        Ok(state
            .into_outcome()
            .expect("DONE state always holds a draft and critique"))
    }

    fn select_sources(&self, state: &mut LoopState) -> (TopicRecord, PostStyleRecord) {
        match self.selection {
            SourceSelection::PerIteration => {
                (self.knowledge.pick_topic(), self.knowledge.pick_style())
            }
            SourceSelection::PinnedPerRun => {
                if let Some((topic, style)) = state.pinned_sources() {
                    return (topic.clone(), style.clone());
                }
                let topic = self.knowledge.pick_topic();
                let style = self.knowledge.pick_style();
                state.pin_sources(topic.clone(), style.clone());
                (topic, style)
            }
        }
    }
}
