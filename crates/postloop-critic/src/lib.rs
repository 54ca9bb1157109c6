//! # postloop-critic
//!
//! Scores drafts against a fixed rubric and decides approval.
//!
//! - [`Critic`] - runs the rubric through a text-generation backend
//! - [`CritiqueResult`] - tolerant parse of the critic's response, with defaults
//! - [`PASS_THRESHOLD`] / [`MIN_INDIVIDUAL_SCORE`] - the acceptance policy

mod critique;
pub mod evaluator;
mod prompts;

pub use critique::{
    CritiqueParseError, CritiqueResult, Verdict, MIN_INDIVIDUAL_SCORE, PASS_THRESHOLD,
};
pub use evaluator::{Critic, CritiqueError};
pub use prompts::CriticPrompts;
