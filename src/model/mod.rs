//! Network architecture: residual blocks, stage assembly, initialization.

pub mod config;
pub mod resnet;

pub use config::{ActivationType, ModelConfig, NUM_STAGES, STAGE_WIDTHS, STEM_WIDTH};
pub use resnet::{Downsample, InitializationPolicy, ParamRole, ResidualBlock, Stage, WasteNet};
