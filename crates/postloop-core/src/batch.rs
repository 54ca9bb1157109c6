use std::time::Duration;
use tracing::{info, warn};

use crate::error::RunError;
use crate::loop_runner::RefinementLoop;
use crate::outcome::RunOutcome;

/// Pause between consecutive runs of a batch
pub const INTER_RUN_PAUSE: Duration = Duration::from_secs(2);

/// Runs several independent refinement loops one after another
pub struct RunBatch<'a> {
    runner: &'a RefinementLoop<'a>,
    pause: Duration,
}

impl<'a> RunBatch<'a> {
    pub fn new(runner: &'a RefinementLoop<'a>) -> Self {
        Self {
            runner,
            pause: INTER_RUN_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run `count` loops sequentially. A failed run does not stop the batch;
    /// results are returned in run order.
    pub async fn run(&self, count: usize) -> Vec<Result<RunOutcome, RunError>> {
        let mut results = Vec::with_capacity(count);

        for run in 1..=count {
            let result = self.runner.run_numbered(run).await;
            match &result {
                Ok(outcome) => info!(
                    run,
                    approved = outcome.approved,
                    iterations = outcome.iterations,
                    "Run finished"
                ),
                Err(e) => warn!(run, error = %e, "Run failed"),
            }
            results.push(result);

            if run < count {
                tokio::time::sleep(self.pause).await;
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loop_runner::tests::{approve, logger, revise, SequentialKnowledge};
    use postloop_llm::ScriptedGenerator;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_batch_pauses_between_runs_only() {
        let writer = ScriptedGenerator::new(["a", "b", "c"]);
        let critic = ScriptedGenerator::new([approve(), approve(), approve()]);
        let knowledge = SequentialKnowledge::new();
        let runner = RefinementLoop::new(&writer, &critic, &knowledge, logger());

        let started = Instant::now();
        let results = RunBatch::new(&runner).run(3).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
        let elapsed = started.elapsed();
        assert!(elapsed >= INTER_RUN_PAUSE * 2);
        assert!(elapsed < INTER_RUN_PAUSE * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_does_not_stop_batch() {
        // Run 1 fails on an unparseable critique, run 2 needs one revision
        let writer = ScriptedGenerator::new(["a", "b", "c"]);
        let critic = ScriptedGenerator::new([
            "no json here".to_string(),
            revise("shorter"),
            approve(),
        ]);
        let knowledge = SequentialKnowledge::new();
        let runner = RefinementLoop::new(&writer, &critic, &knowledge, logger());

        let results = RunBatch::new(&runner).run(2).await;

        assert!(results[0].as_ref().unwrap_err().is_parse_failure());
        let second = results[1].as_ref().unwrap();
        assert!(second.approved);
        assert_eq!(second.iterations, 2);
        assert_eq!(second.draft.text, "c");
    }

    #[tokio::test]
    async fn test_zero_runs() {
        let writer = ScriptedGenerator::new(Vec::<String>::new());
        let critic = ScriptedGenerator::new(Vec::<String>::new());
        let knowledge = SequentialKnowledge::new();
        let runner = RefinementLoop::new(&writer, &critic, &knowledge, logger());

        let results = RunBatch::new(&runner).with_pause(Duration::ZERO).run(0).await;
        assert!(results.is_empty());
        assert_eq!(writer.call_count(), 0);
    }
}
