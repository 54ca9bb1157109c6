//! The unit of work shared by the CLI, the HTTP API and the scheduler:
//! probe the model, run a batch, publish, record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use postloop_core::{
    RefinementLoop, RunBatch, RunError, RunOutcome, SourceSelection, INTER_RUN_PAUSE,
};
use postloop_knowledge::KnowledgeSource;
use postloop_llm::TextGenerator;
use postloop_logging::{HistoryEntry, LogEvent, Logger, PostHistory, PostRecord};
use postloop_publish::{PostId, Publisher};

/// Pause after each successful publish
pub const PUBLISH_PAUSE: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Model '{model}' is not available at {backend}")]
    ModelUnavailable { model: String, backend: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Approved,
    Unapproved,
    Failed,
}

/// One run of a pipeline batch
#[derive(Debug, Clone, Serialize)]
pub struct PostReport {
    pub run: usize,
    pub status: RunStatus,
    pub text: Option<String>,
    pub topic: Option<String>,
    pub style: Option<String>,
    pub character_count: Option<usize>,
    pub iterations: usize,
    pub overall_score: Option<f64>,
    pub published: bool,
    pub post_id: Option<PostId>,
    pub error: Option<String>,
    #[serde(skip)]
    generated_at: Option<DateTime<Utc>>,
}

impl PostReport {
    fn from_outcome(run: usize, outcome: &RunOutcome) -> Self {
        Self {
            run,
            status: if outcome.approved {
                RunStatus::Approved
            } else {
                RunStatus::Unapproved
            },
            text: Some(outcome.text().to_string()),
            topic: Some(outcome.draft.topic.clone()),
            style: Some(outcome.draft.style_name.clone()),
            character_count: Some(outcome.draft.character_count),
            iterations: outcome.iterations,
            overall_score: Some(outcome.critique.overall_score),
            published: false,
            post_id: None,
            error: None,
            generated_at: Some(outcome.draft.generated_at),
        }
    }

    fn failed(run: usize, err: &RunError) -> Self {
        Self {
            run,
            status: RunStatus::Failed,
            text: None,
            topic: None,
            style: None,
            character_count: None,
            iterations: err.iteration(),
            overall_score: None,
            published: false,
            post_id: None,
            error: Some(err.to_string()),
            generated_at: None,
        }
    }

    fn to_record(&self) -> PostRecord {
        PostRecord {
            text: self.text.clone(),
            topic: self.topic.clone(),
            style: self.style.clone(),
            character_count: self.character_count,
            iterations: self.iterations,
            approved: self.status == RunStatus::Approved,
            overall_score: self.overall_score,
            posted: self.published,
            post_id: self.post_id.as_ref().map(ToString::to_string),
            error: self.error.clone(),
            generated_at: self.generated_at.or_else(|| Some(Utc::now())),
        }
    }
}

/// Result of one unit of work
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub publish_requested: bool,
    pub posts: Vec<PostReport>,
    pub generated: usize,
    pub published: usize,
    pub failed: usize,
}

impl PipelineReport {
    fn new(started_at: DateTime<Utc>, publish_requested: bool, posts: Vec<PostReport>) -> Self {
        let generated = posts.iter().filter(|p| p.text.is_some()).count();
        let published = posts.iter().filter(|p| p.published).count();
        let failed = posts.len() - generated;
        Self {
            started_at,
            publish_requested,
            posts,
            generated,
            published,
            failed,
        }
    }

    /// 2 if any run failed, 1 if a run ended unapproved or a requested
    /// publish did not happen, otherwise 0
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            2
        } else if self
            .posts
            .iter()
            .any(|p| p.status == RunStatus::Unapproved || (self.publish_requested && !p.published))
        {
            1
        } else {
            0
        }
    }
}

/// Knobs for a [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub selection: SourceSelection,
    pub publish_unapproved: bool,
    pub inter_run_pause: Duration,
    pub publish_pause: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            selection: SourceSelection::default(),
            publish_unapproved: true,
            inter_run_pause: INTER_RUN_PAUSE,
            publish_pause: PUBLISH_PAUSE,
        }
    }
}

pub struct Pipeline {
    generator_model: Arc<dyn TextGenerator>,
    critic_model: Arc<dyn TextGenerator>,
    knowledge: Arc<dyn KnowledgeSource>,
    publisher: Arc<dyn Publisher>,
    history: Arc<PostHistory>,
    logger: Arc<Logger>,
    options: PipelineOptions,
    run_guard: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        generator_model: Arc<dyn TextGenerator>,
        critic_model: Arc<dyn TextGenerator>,
        knowledge: Arc<dyn KnowledgeSource>,
        publisher: Arc<dyn Publisher>,
        history: Arc<PostHistory>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator_model,
            critic_model,
            knowledge,
            publisher,
            history,
            logger,
            options: PipelineOptions::default(),
            run_guard: Mutex::new(()),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn publisher(&self) -> &dyn Publisher {
        self.publisher.as_ref()
    }

    pub fn history(&self) -> &PostHistory {
        &self.history
    }

    pub fn generator_model(&self) -> &dyn TextGenerator {
        self.generator_model.as_ref()
    }

    pub fn critic_model(&self) -> &dyn TextGenerator {
        self.critic_model.as_ref()
    }

    /// Both backends answer and have their model installed
    pub async fn models_available(&self) -> Result<(), PipelineError> {
        for model in [&self.generator_model, &self.critic_model] {
            if !model.is_available().await {
                return Err(PipelineError::ModelUnavailable {
                    model: model.model().to_string(),
                    backend: model.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run `count` refinement loops, optionally publish the results and
    /// append one history entry. Concurrent calls queue behind each other.
    pub async fn run_once(
        &self,
        count: usize,
        publish: bool,
    ) -> Result<PipelineReport, PipelineError> {
        let _guard = self.run_guard.lock().await;
        let started_at = Utc::now();

        if let Err(e) = self.models_available().await {
            warn!(error = %e, "Skipping run");
            return Err(e);
        }

        let runner = RefinementLoop::new(
            self.generator_model.as_ref(),
            self.critic_model.as_ref(),
            self.knowledge.as_ref(),
            self.logger.clone(),
        )
        .with_source_selection(self.options.selection);
        let results = RunBatch::new(&runner)
            .with_pause(self.options.inter_run_pause)
            .run(count)
            .await;

        let mut posts = Vec::with_capacity(results.len());
        for (i, result) in results.iter().enumerate() {
            let run = i + 1;
            let mut post = match result {
                Ok(outcome) => PostReport::from_outcome(run, outcome),
                Err(e) => PostReport::failed(run, e),
            };

            if publish && self.should_publish(&post) {
                self.publish(&mut post).await;
            }
            posts.push(post);
        }

        let report = PipelineReport::new(started_at, publish, posts);
        let records = report.posts.iter().map(PostReport::to_record).collect();
        if let Err(e) = self.history.append(HistoryEntry::new(records, publish)) {
            warn!(error = %e, path = %self.history.path().display(), "Failed to record history");
        }

        info!(
            generated = report.generated,
            published = report.published,
            failed = report.failed,
            "Pipeline run finished"
        );
        Ok(report)
    }

    fn should_publish(&self, post: &PostReport) -> bool {
        match post.status {
            RunStatus::Approved => true,
            RunStatus::Unapproved => self.options.publish_unapproved,
            RunStatus::Failed => false,
        }
    }

    async fn publish(&self, post: &mut PostReport) {
        let Some(text) = post.text.as_deref() else {
            return;
        };

        match self.publisher.publish(text).await {
            Ok(id) => {
                self.logger.log(&LogEvent::PostPublished {
                    post_id: id.to_string(),
                    characters: text.chars().count(),
                });
                post.published = true;
                post.post_id = Some(id);
                tokio::time::sleep(self.options.publish_pause).await;
            }
            Err(e) => {
                self.logger.log(&LogEvent::PublishFailed {
                    error: e.to_string(),
                });
                post.error = Some(e.to_string());
            }
        }
    }
}
