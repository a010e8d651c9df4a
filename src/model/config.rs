//! Model configuration.
//!
//! The network shape is fixed (stem + four stages of widths 64→128→256→512 +
//! linear head); the configuration controls how many residual blocks each
//! stage holds, the category count, and the activation.

use serde::{Deserialize, Serialize};

use burn::prelude::*;
use burn::tensor::activation;

use crate::utils::error::{Result, WasteNetError};

/// Number of residual stages
pub const NUM_STAGES: usize = 4;

/// Output channel width of each stage
pub const STAGE_WIDTHS: [usize; NUM_STAGES] = [64, 128, 256, 512];

/// Channel width produced by the stem convolution
pub const STEM_WIDTH: usize = 64;

/// Configuration for the residual classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output categories
    pub num_classes: usize,

    /// Residual blocks per stage; length must equal [`NUM_STAGES`]
    pub block_counts: Vec<usize>,

    /// Input channels (3 for RGB)
    pub in_channels: usize,

    /// Input image edge length; must be a positive multiple of 32, the
    /// network's total downsampling factor
    pub input_size: usize,

    /// Activation used throughout the network
    pub activation: ActivationType,

    /// Zero the final norm scale of every residual block so each block
    /// starts training as an identity on its skip path
    pub zero_init_residual: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes: crate::dataset::NUM_CLASSES,
            block_counts: vec![3, 4, 6, 3],
            in_channels: 3,
            input_size: crate::dataset::IMAGE_SIZE,
            activation: ActivationType::Gelu,
            zero_init_residual: true,
        }
    }
}

impl ModelConfig {
    /// A configuration with custom category count
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// The 34-layer arrangement (default)
    pub fn resnet34(num_classes: usize) -> Self {
        Self::new(num_classes)
    }

    /// The 18-layer arrangement, for quicker experiments
    pub fn resnet18(num_classes: usize) -> Self {
        Self {
            num_classes,
            block_counts: vec![2, 2, 2, 2],
            ..Default::default()
        }
    }

    /// Reject invalid configurations before any compute happens.
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(WasteNetError::Configuration(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.block_counts.len() != NUM_STAGES {
            return Err(WasteNetError::Configuration(format!(
                "block_counts must list {} stages, got {}",
                NUM_STAGES,
                self.block_counts.len()
            )));
        }

        if self.block_counts.iter().any(|&c| c == 0) {
            return Err(WasteNetError::Configuration(
                "every stage needs at least one block".to_string(),
            ));
        }

        if self.in_channels == 0 {
            return Err(WasteNetError::Configuration(
                "in_channels must be greater than 0".to_string(),
            ));
        }

        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(WasteNetError::Configuration(format!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            )));
        }

        Ok(())
    }

    /// Save configuration as JSON
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Load configuration from JSON
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Supported activation functions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivationType {
    /// GELU, the default
    Gelu,
    /// ReLU
    Relu,
}

impl Default for ActivationType {
    fn default() -> Self {
        Self::Gelu
    }
}

impl ActivationType {
    /// Apply the activation to a tensor
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            ActivationType::Gelu => activation::gelu(x),
            ActivationType::Relu => activation::relu(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ModelConfig::default();
        assert_eq!(config.num_classes, 6);
        assert_eq!(config.block_counts, vec![3, 4, 6, 3]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wrong_stage_count_rejected() {
        let config = ModelConfig {
            block_counts: vec![2, 2, 2],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_blocks_rejected() {
        let config = ModelConfig {
            block_counts: vec![2, 0, 2, 2],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_input_size_must_be_multiple_of_32() {
        let config = ModelConfig {
            input_size: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = ModelConfig::resnet18(4);
        let path = std::env::temp_dir().join(format!(
            "wastenet_config_test_{}.json",
            std::process::id()
        ));

        config.save(&path).unwrap();
        let loaded = ModelConfig::load(&path).unwrap();

        assert_eq!(loaded.num_classes, 4);
        assert_eq!(loaded.block_counts, vec![2, 2, 2, 2]);
        std::fs::remove_file(&path).unwrap();
    }
}
