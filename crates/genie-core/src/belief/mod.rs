//! Posterior tracking over candidate entities.
//!
//! This module is composed of:
//! - `answer`: the closed set of graded player answers.
//! - `likelihood`: the mistake-tolerant noisy-answer likelihood model.
//! - `state`: the per-game posterior vector and its update contract.
//! - `sampler`: weighted entity draws consuming a prior or posterior.

mod answer;
mod likelihood;
mod sampler;
mod state;

pub use answer::GradedAnswer;
pub use likelihood::{LikelihoodConfig, LikelihoodModel};
pub use sampler::sample_entity;
pub use state::{BeliefError, BeliefState};
