//! Residual network for waste-photo classification.
//!
//! The network is a standard basic-block residual architecture: a wide-kernel
//! strided stem, four stages of residual blocks at widths 64→128→256→512, a
//! global average pool, and a linear head. The stem downsamples 4×, each
//! inter-stage transition after the first downsamples 2×, so the features
//! feeding the head are 32× smaller than the input.
//!
//! Weight initialization is applied at construction through
//! [`InitializationPolicy`], which dispatches on a typed [`ParamRole`] tag
//! instead of inspecting the assembled module graph after the fact.

use burn::module::Ignored;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use crate::model::config::{ActivationType, ModelConfig, NUM_STAGES, STAGE_WIDTHS, STEM_WIDTH};
use crate::utils::error::{Result, WasteNetError};

/// Where a parameter sits in the assembled network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// The stem's wide-kernel convolution
    StemConv,
    /// A 3×3 convolution inside a residual block
    BlockConv,
    /// The 1×1 projection convolution on a skip path
    SkipConv,
    /// The norm after a block's first convolution
    BlockNorm,
    /// The norm after a block's second convolution, summed with the skip path
    ResidualNorm,
    /// The norm inside a skip-path projection
    SkipNorm,
    /// The classifier head
    HeadLinear,
}

/// Weight-initialization rules, dispatched on [`ParamRole`]
#[derive(Debug, Clone)]
pub struct InitializationPolicy {
    zero_init_residual: bool,
}

impl InitializationPolicy {
    pub fn new(zero_init_residual: bool) -> Self {
        Self { zero_init_residual }
    }

    /// Variance-scaling initializer for convolutions, keyed to output fan
    pub fn conv_initializer(&self, _role: ParamRole) -> Initializer {
        Initializer::KaimingNormal {
            gain: std::f64::consts::SQRT_2,
            fan_out_only: true,
        }
    }

    /// Initializer for the classifier head
    pub fn linear_initializer(&self, _role: ParamRole) -> Initializer {
        Initializer::KaimingUniform {
            gain: 1.0 / 3.0f64.sqrt(),
            fan_out_only: false,
        }
    }

    /// Adjust a freshly built norm layer for its role.
    ///
    /// Scale starts at one and shift at zero everywhere; the norm closing a
    /// residual branch additionally has its scale zeroed so the block begins
    /// training as an identity on the skip path.
    pub fn init_norm<B: Backend>(&self, norm: BatchNorm<B>, role: ParamRole) -> BatchNorm<B> {
        match role {
            ParamRole::ResidualNorm if self.zero_init_residual => {
                let mut norm = norm;
                norm.gamma = norm.gamma.map(|gamma| gamma.zeros_like());
                norm
            }
            _ => norm,
        }
    }
}

/// Skip-path projection: 1×1 strided convolution + norm
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        policy: &InitializationPolicy,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .with_initializer(policy.conv_initializer(ParamRole::SkipConv))
            .init(device);
        let norm = policy.init_norm(
            BatchNormConfig::new(out_channels).init(device),
            ParamRole::SkipNorm,
        );

        Self { conv, norm }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

/// Basic residual block: two 3×3 convolutions with a skip connection
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    downsample: Option<Downsample<B>>,
    activation: Ignored<ActivationType>,
}

impl<B: Backend> ResidualBlock<B> {
    /// Build a block.
    ///
    /// A block that changes spatial size (`stride != 1`) or channel width
    /// must be given a projection so the two paths stay shape-compatible;
    /// omitting it is a configuration error caught here, at assembly time.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        downsample: Option<Downsample<B>>,
        activation: ActivationType,
        policy: &InitializationPolicy,
        device: &B::Device,
    ) -> Result<Self> {
        let needs_projection = stride != 1 || in_channels != out_channels;
        if needs_projection && downsample.is_none() {
            return Err(WasteNetError::Configuration(format!(
                "residual block {}→{} with stride {} requires a skip projection",
                in_channels, out_channels, stride
            )));
        }

        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(policy.conv_initializer(ParamRole::BlockConv))
            .init(device);
        let bn1 = policy.init_norm(
            BatchNormConfig::new(out_channels).init(device),
            ParamRole::BlockNorm,
        );

        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(policy.conv_initializer(ParamRole::BlockConv))
            .init(device);
        let bn2 = policy.init_norm(
            BatchNormConfig::new(out_channels).init(device),
            ParamRole::ResidualNorm,
        );

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
            activation: Ignored(activation),
        })
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(projection) => projection.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.conv1.forward(x);
        let out = self.bn1.forward(out);
        let out = self.activation.0.apply(out);

        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        self.activation.0.apply(out + identity)
    }
}

/// An ordered run of residual blocks sharing one output width
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> Stage<B> {
    /// Build a stage: the first block carries the stride (and a projection
    /// exactly when the stride is not 1 or the width changes), the rest are
    /// stride-1 blocks at the new width.
    pub fn new(
        in_channels: usize,
        width: usize,
        count: usize,
        stride: usize,
        activation: ActivationType,
        policy: &InitializationPolicy,
        device: &B::Device,
    ) -> Result<Self> {
        let downsample = if stride != 1 || in_channels != width {
            Some(Downsample::new(in_channels, width, stride, policy, device))
        } else {
            None
        };

        let mut blocks = Vec::with_capacity(count);
        blocks.push(ResidualBlock::new(
            in_channels,
            width,
            stride,
            downsample,
            activation,
            policy,
            device,
        )?);

        for _ in 1..count {
            blocks.push(ResidualBlock::new(
                width, width, 1, None, activation, policy, device,
            )?);
        }

        Ok(Self { blocks })
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .fold(x, |features, block| block.forward(features))
    }
}

/// The assembled residual classifier
#[derive(Module, Debug)]
pub struct WasteNet<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_norm: BatchNorm<B>,
    stem_pool: MaxPool2d,
    stages: Vec<Stage<B>>,
    head_pool: AdaptiveAvgPool2d,
    head: Linear<B>,
    activation: Ignored<ActivationType>,
    num_classes: usize,
}

impl<B: Backend> WasteNet<B> {
    /// Assemble and initialize the network from its configuration.
    ///
    /// The output is a pure function of the configuration and the backend's
    /// RNG state; seed the backend before calling for reproducible weights.
    pub fn new(config: &ModelConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let policy = InitializationPolicy::new(config.zero_init_residual);

        let stem_conv = Conv2dConfig::new([config.in_channels, STEM_WIDTH], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(policy.conv_initializer(ParamRole::StemConv))
            .init(device);
        let stem_norm = BatchNormConfig::new(STEM_WIDTH).init(device);
        let stem_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut stages = Vec::with_capacity(NUM_STAGES);
        let mut width = STEM_WIDTH;
        for (stage_idx, (&stage_width, &count)) in STAGE_WIDTHS
            .iter()
            .zip(config.block_counts.iter())
            .enumerate()
        {
            // The stem already downsampled 4×, so the first stage keeps
            // its resolution.
            let stride = if stage_idx == 0 { 1 } else { 2 };
            stages.push(Stage::new(
                width,
                stage_width,
                count,
                stride,
                config.activation,
                &policy,
                device,
            )?);
            width = stage_width;
        }

        let head_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let head = LinearConfig::new(width, config.num_classes)
            .with_initializer(policy.linear_initializer(ParamRole::HeadLinear))
            .init(device);

        Ok(Self {
            stem_conv,
            stem_norm,
            stem_pool,
            stages,
            head_pool,
            head,
            activation: Ignored(config.activation),
            num_classes: config.num_classes,
        })
    }

    /// Feature extractor: stem and all four stages.
    ///
    /// Output spatial size is exactly 1/32 of the input.
    pub fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.stem_conv.forward(x);
        let x = self.stem_norm.forward(x);
        let x = self.activation.0.apply(x);
        let x = self.stem_pool.forward(x);

        self.stages
            .iter()
            .fold(x, |features, stage| stage.forward(features))
    }

    /// Forward pass: `[batch, channels, h, w]` → logits `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.features(x);
        let x = self.head_pool.forward(x);

        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        self.head.forward(x)
    }

    /// Forward pass returning class probabilities
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    /// Number of output categories
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
