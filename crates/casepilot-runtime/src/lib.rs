//! # casepilot-runtime
//!
//! The investigation pipeline: the turn-bounded orchestration loop, the
//! critic reviewer, and the replay engine that measures verdict stability.

pub mod critic;
pub mod digest;
pub mod investigator;
pub mod pipeline;
pub mod prompts;
pub mod replay;
pub mod summarize;

pub use critic::{Critic, CriticOutcome};
pub use investigator::Investigator;
pub use pipeline::Pipeline;
pub use replay::{
    Paraphraser, PerturbationSource, Perturbations, ReplayEngine, ReplayHandle, compute_stability,
};
pub use summarize::SummarizerRegistry;
