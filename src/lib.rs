//! # wastenet
//!
//! A residual convolutional classifier for waste photographs, built with the
//! Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: folder-tree discovery, decoding, splitting, and batching
//! - `model`: residual blocks, stage assembly, and weight initialization
//! - `training`: learning-rate probing, stage schedules, and the
//!   three-stage training orchestrator
//! - `eval`: per-class reports, confusion matrix, and test-time augmentation
//! - `utils`: errors, metrics, and logging
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wastenet::backend::TrainingBackend;
//! use wastenet::dataset::WasteFolderDataset;
//! use wastenet::model::{ModelConfig, WasteNet};
//! use wastenet::training::{OrchestratorConfig, TrainingOrchestrator};
//!
//! let device = Default::default();
//! let model = WasteNet::<TrainingBackend>::new(&ModelConfig::default(), &device)?;
//! let mut orchestrator =
//!     TrainingOrchestrator::new(model, OrchestratorConfig::default(), device)?;
//! // ... load datasets and call orchestrator.run(&train, &valid)
//! ```

pub mod backend;
pub mod dataset;
pub mod eval;
pub mod model;
pub mod training;
pub mod utils;

pub use dataset::{WasteBatch, WasteBatcher, WasteFolderDataset, WasteItem, WasteTensorDataset};
pub use eval::{EvaluationRecord, EvaluationReport, Evaluator};
pub use model::{ModelConfig, WasteNet};
pub use training::{OrchestratorConfig, RunReport, TrainingOrchestrator, TrainingStage};
pub use utils::error::{Result, WasteNetError};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Number of waste categories
pub const NUM_CLASSES: usize = dataset::NUM_CLASSES;

/// Default image edge length
pub const IMAGE_SIZE: usize = dataset::IMAGE_SIZE;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
