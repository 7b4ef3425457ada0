//! Residual blocks and the stages that stack them.

use crate::blocks::BlockFn;
use crate::complexity::Padding;
use crate::config::{check_positive, BlockConfig, ConfigError, ConfigResult, Pair};
use crate::error::Result;
use crate::graph::GraphResult;
use crate::nn::{Activation, BatchNorm, Conv2d, Module};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Two 3x3 convolutions with an identity or projected shortcut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResBasicBlockConfig {
    pub filters: usize,
    pub strides: Pair,
    #[serde(default)]
    pub activation: Activation,
}

impl BlockConfig for ResBasicBlockConfig {
    const NAME: &'static str = "res_basic_block";
    const REQUIRED: &'static [&'static str] = &["filters", "strides"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "filters", self.filters)?;
        self.strides.check_nonzero(block, "strides")
    }
}

/// 1x1 reduce, grouped 3x3, 1x1 expand, with an identity or projected shortcut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResBottleneckBlockConfig {
    pub filters: usize,
    pub strides: Pair,
    pub groups: usize,
    pub bottleneck_ratio: f64,
    #[serde(default)]
    pub activation: Activation,
}

impl ResBottleneckBlockConfig {
    /// Width of the grouped 3x3 convolution, `floor(filters * bottleneck_ratio)`.
    pub fn bottleneck_size(&self) -> usize {
        (self.filters as f64 * self.bottleneck_ratio).floor() as usize
    }
}

impl BlockConfig for ResBottleneckBlockConfig {
    const NAME: &'static str = "res_bottleneck_block";
    const REQUIRED: &'static [&'static str] = &["filters", "strides", "groups", "bottleneck_ratio"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "filters", self.filters)?;
        check_positive(block, "groups", self.groups)?;
        self.strides.check_nonzero(block, "strides")?;
        if !(self.bottleneck_ratio.is_finite() && self.bottleneck_ratio > 0.0) {
            return Err(ConfigError::InvalidParameter {
                block,
                reason: format!("bottleneck_ratio must be positive, got {}", self.bottleneck_ratio),
            });
        }
        let bottleneck = self.bottleneck_size();
        check_positive(block, "filters * bottleneck_ratio", bottleneck)?;
        if self.filters % self.groups != 0 || bottleneck % self.groups != 0 {
            return Err(ConfigError::InvalidParameter {
                block,
                reason: format!(
                    "filters ({}) and bottleneck size ({bottleneck}) must be divisible by groups ({})",
                    self.filters, self.groups
                ),
            });
        }
        Ok(())
    }
}

/// `depth` residual blocks; only the first one uses `strides`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResBasicStageConfig {
    pub depth: usize,
    #[serde(flatten)]
    pub block: ResBasicBlockConfig,
}

impl ResBasicStageConfig {
    /// Configuration of the `index`-th block of the stage.
    pub fn block_at(&self, index: usize) -> ResBasicBlockConfig {
        let mut block = self.block.clone();
        if index > 0 {
            block.strides = Pair::Scalar(1);
        }
        block
    }
}

impl BlockConfig for ResBasicStageConfig {
    const NAME: &'static str = "res_basic_stage";
    const REQUIRED: &'static [&'static str] = &["depth", "filters", "strides"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "depth", self.depth)?;
        self.block.validate(block)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResBottleneckStageConfig {
    pub depth: usize,
    #[serde(flatten)]
    pub block: ResBottleneckBlockConfig,
}

impl ResBottleneckStageConfig {
    /// Configuration of the `index`-th block of the stage.
    pub fn block_at(&self, index: usize) -> ResBottleneckBlockConfig {
        let mut block = self.block.clone();
        if index > 0 {
            block.strides = Pair::Scalar(1);
        }
        block
    }
}

impl BlockConfig for ResBottleneckStageConfig {
    const NAME: &'static str = "res_bottleneck_stage";
    const REQUIRED: &'static [&'static str] =
        &["depth", "filters", "strides", "groups", "bottleneck_ratio"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "depth", self.depth)?;
        self.block.validate(block)
    }
}

/// Whether the shortcut needs a 1x1 projection to match the main path.
pub fn needs_projection(strides: Pair, in_channels: usize, filters: usize) -> bool {
    !strides.is_unit() || in_channels != filters
}

/// Joins the main path with the (possibly projected) shortcut and activates.
fn join_shortcut(
    inputs: &Tensor,
    out: &Tensor,
    filters: usize,
    strides: (usize, usize),
    activation: Activation,
) -> GraphResult<Tensor> {
    let shortcut = if needs_projection(strides.into(), inputs.channels()?, filters) {
        Conv2d::new(filters, (1, 1)).with_stride(strides).forward(inputs)?
    } else {
        inputs.clone()
    };
    activation.forward(&(out + &shortcut)?)
}

pub fn res_basic_block(config: &ResBasicBlockConfig) -> Result<BlockFn> {
    config.validate(ResBasicBlockConfig::NAME)?;
    let filters = config.filters;
    let strides = config.strides.dims();
    let activation = config.activation;
    let conv1 = Conv2d::new(filters, (3, 3))
        .with_stride(strides)
        .with_padding(Padding::Same);
    let conv2 = Conv2d::new(filters, (3, 3)).with_padding(Padding::Same);

    Ok(Box::new(move |inputs: &Tensor| {
        let out = conv1.forward(inputs)?;
        let out = BatchNorm::new().forward(&out)?;
        let out = activation.forward(&out)?;

        let out = conv2.forward(&out)?;
        let out = BatchNorm::new().forward(&out)?;

        join_shortcut(inputs, &out, filters, strides, activation)
    }))
}

pub fn res_bottleneck_block(config: &ResBottleneckBlockConfig) -> Result<BlockFn> {
    config.validate(ResBottleneckBlockConfig::NAME)?;
    let filters = config.filters;
    let strides = config.strides.dims();
    let activation = config.activation;
    let reduce = Conv2d::new(filters, (1, 1));
    let grouped = Conv2d::new(config.bottleneck_size(), (3, 3))
        .with_stride(strides)
        .with_padding(Padding::Same)
        .with_groups(config.groups);
    let expand = Conv2d::new(filters, (1, 1));

    Ok(Box::new(move |inputs: &Tensor| {
        let out = reduce.forward(inputs)?;
        let out = BatchNorm::new().forward(&out)?;
        let out = activation.forward(&out)?;

        let out = grouped.forward(&out)?;
        let out = BatchNorm::new().forward(&out)?;
        let out = activation.forward(&out)?;

        let out = expand.forward(&out)?;
        let out = BatchNorm::new().forward(&out)?;

        join_shortcut(inputs, &out, filters, strides, activation)
    }))
}

/// Applies `blocks` one after another.
fn chain(blocks: Vec<BlockFn>) -> BlockFn {
    Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        for block in &blocks {
            x = block(&x)?;
        }
        Ok(x)
    })
}

pub fn res_basic_stage(config: &ResBasicStageConfig) -> Result<BlockFn> {
    config.validate(ResBasicStageConfig::NAME)?;
    let blocks = (0..config.depth)
        .map(|i| res_basic_block(&config.block_at(i)))
        .collect::<Result<Vec<_>>>()?;
    Ok(chain(blocks))
}

pub fn res_bottleneck_stage(config: &ResBottleneckStageConfig) -> Result<BlockFn> {
    config.validate(ResBottleneckStageConfig::NAME)?;
    let blocks = (0..config.depth)
        .map(|i| res_bottleneck_block(&config.block_at(i)))
        .collect::<Result<Vec<_>>>()?;
    Ok(chain(blocks))
}
