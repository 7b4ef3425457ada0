//! Densely connected block: every layer sees the concatenation of all
//! previous feature maps, followed by a compressing transition.

use crate::blocks::BlockFn;
use crate::complexity::Padding;
use crate::config::{check_positive, BlockConfig, ConfigError, ConfigResult, Pair};
use crate::error::Result;
use crate::graph::GraphResult;
use crate::nn::{Activation, AvgPool2d, BatchNorm, Conv2d, Module};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

fn default_bottleneck_ratio() -> usize {
    4
}

fn default_reduction() -> f64 {
    0.5
}

fn default_strides() -> Pair {
    Pair::Scalar(2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetBlockConfig {
    /// Channels added by every layer.
    pub growth_rate: usize,
    pub depth: usize,
    /// Width of the 1x1 bottleneck as a multiple of `growth_rate`.
    #[serde(default = "default_bottleneck_ratio")]
    pub bottleneck_ratio: usize,
    /// Channel compression of the transition layer.
    #[serde(default = "default_reduction")]
    pub reduction: f64,
    /// Transition pooling; `1` keeps the resolution and skips the pooling.
    #[serde(default = "default_strides")]
    pub strides: Pair,
}

impl DenseNetBlockConfig {
    /// Output channels of the transition for `channels` input channels.
    pub fn transition_filters(&self, channels: usize) -> usize {
        (channels as f64 * self.reduction).floor() as usize
    }
}

impl BlockConfig for DenseNetBlockConfig {
    const NAME: &'static str = "dense_net_block";
    const REQUIRED: &'static [&'static str] = &["growth_rate", "depth"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "growth_rate", self.growth_rate)?;
        check_positive(block, "depth", self.depth)?;
        check_positive(block, "bottleneck_ratio", self.bottleneck_ratio)?;
        self.strides.check_nonzero(block, "strides")?;
        if !(self.reduction > 0.0 && self.reduction <= 1.0) {
            return Err(ConfigError::InvalidParameter {
                block,
                reason: format!("reduction must be in (0, 1], got {}", self.reduction),
            });
        }
        Ok(())
    }
}

fn bn_relu_conv(x: &Tensor, conv: Conv2d) -> GraphResult<Tensor> {
    let x = BatchNorm::new().forward(x)?;
    let x = Activation::Relu.forward(&x)?;
    conv.forward(&x)
}

pub fn dense_net_block(config: &DenseNetBlockConfig) -> Result<BlockFn> {
    config.validate(DenseNetBlockConfig::NAME)?;
    let config = config.clone();
    let bottleneck = Conv2d::new(config.bottleneck_ratio * config.growth_rate, (1, 1)).with_bias(false);
    let growth = Conv2d::new(config.growth_rate, (3, 3))
        .with_padding(Padding::Same)
        .with_bias(false);

    Ok(Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        for _ in 0..config.depth {
            let h = bn_relu_conv(&x, bottleneck)?;
            let h = bn_relu_conv(&h, growth)?;
            x = x.concat(&h)?;
        }

        let filters = config.transition_filters(x.channels()?);
        let x = bn_relu_conv(&x, Conv2d::new(filters, (1, 1)).with_bias(false))?;
        if config.strides.is_unit() {
            Ok(x)
        } else {
            AvgPool2d::new(config.strides.dims()).forward(&x)
        }
    }))
}

pub fn dense_net_stage(config: &DenseNetBlockConfig) -> Result<BlockFn> {
    config.validate("dense_net_stage")?;
    dense_net_block(config)
}
