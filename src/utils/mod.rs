//! Shared utilities: error types, metrics, and logging.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, WasteNetError};
pub use metrics::{ClassMetrics, ConfusionMatrix, Metrics};
