//! # postloop-core
//!
//! The generate-critique refinement loop.
//!
//! A run moves START -> GENERATING -> CRITIQUING and then either back to
//! GENERATING with the critic's rewrite direction, or to DONE once the draft
//! is approved or [`MAX_ITERATIONS`] drafts have been produced.
//!
//! - [`RefinementLoop`] - drives one run against a generator and a critic
//! - [`RunBatch`] - sequential runs with a pause in between
//! - [`RunOutcome`] - final draft, critique and per-iteration history

mod batch;
mod error;
mod loop_runner;
mod outcome;
mod state;

pub use batch::{RunBatch, INTER_RUN_PAUSE};
pub use error::RunError;
pub use loop_runner::RefinementLoop;
pub use outcome::{RunOutcome, Termination};
pub use state::{IterationRecord, LoopPhase, LoopState, SourceSelection, MAX_ITERATIONS};
