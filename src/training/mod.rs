//! Training: learning-rate probing, per-stage schedules, and the
//! multi-stage orchestrator.

pub mod lr_finder;
pub mod orchestrator;
pub mod schedule;

pub use lr_finder::{find_lr, LrFinderConfig, LrProbe};
pub use orchestrator::{OrchestratorConfig, RunReport, TrainingOrchestrator, TrainingStage};
pub use schedule::StageSchedule;

/// Default epochs per stage: constant, cyclical, convergence
pub const DEFAULT_STAGE_EPOCHS: [usize; 3] = [24, 24, 12];

/// Default early-stopping patience (epochs without improvement)
pub const DEFAULT_PATIENCE: usize = 4;

/// Default minimum macro-F1 gain that counts as improvement
pub const DEFAULT_MIN_DELTA: f64 = 0.001;
