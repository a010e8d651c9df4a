//! Error types for the wastenet pipeline.
//!
//! Uses thiserror for ergonomic error definitions. Configuration and probe
//! failures are fatal for a run and are never retried; a training divergence
//! aborts the run but leaves any previously saved checkpoint usable.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for wastenet operations
#[derive(Error, Debug)]
pub enum WasteNetError {
    /// Invalid model or stage configuration, detected before any training
    /// compute happens (e.g. a block that changes shape without a projection,
    /// or a block-count list that does not match the stage layout)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The learning-rate finder could not produce a usable rate across the
    /// swept range
    #[error("learning-rate probe failed over [{start_lr:.1e}, {end_lr:.1e}]: {reason}")]
    ProbeFailure {
        start_lr: f64,
        end_lr: f64,
        reason: String,
    },

    /// Training loss became non-finite mid-epoch
    #[error("loss diverged to a non-finite value at epoch {epoch}, batch {batch}")]
    Divergence { epoch: usize, batch: usize },

    /// Error loading or decoding an image
    #[error("failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset discovery or splitting
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Error saving or restoring a parameter snapshot
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for wastenet operations
pub type Result<T> = std::result::Result<T, WasteNetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WasteNetError::Dataset("no class directories found".to_string());
        assert_eq!(
            format!("{}", err),
            "dataset error: no class directories found"
        );
    }

    #[test]
    fn test_probe_failure_records_range() {
        let err = WasteNetError::ProbeFailure {
            start_lr: 1e-7,
            end_lr: 10.0,
            reason: "loss non-finite at every step".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("probe failed"));
        assert!(msg.contains("loss non-finite"));
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/data/train/glass/glass_12.jpg");
        let err = WasteNetError::ImageLoad(path, "corrupt jpeg".to_string());
        assert!(format!("{}", err).contains("glass_12.jpg"));
    }
}
