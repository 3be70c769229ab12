//! Replay and stability measurement.
//!
//! A replay session re-runs a finished investigation against paraphrases
//! of its original message and scores how often the decision survives.

pub mod engine;
pub mod perturb;
pub mod stability;

pub use engine::{ReplayEngine, ReplayHandle};
pub use perturb::{Paraphraser, PerturbationSource, Perturbations, template_perturbations};
pub use stability::{compute_stability, replay_run_from_result};
