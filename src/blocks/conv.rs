//! Convolutional blocks and stages.

use crate::blocks::BlockFn;
use crate::complexity::Padding;
use crate::config::{check_positive, check_rate, BlockConfig, ConfigError, ConfigResult, Pair};
use crate::error::Result;
use crate::graph::LayerKind;
use crate::nn::{Activation, BatchNorm, Conv2d, Dropout, ExpertConv2d, Layer, MaxPool2d, Module};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Configuration shared by the pooled conv blocks: one conv stage per entry
/// of `filters`, each followed by pooling with the matching `pool_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvBlockConfig {
    pub filters: Vec<usize>,
    pub pool_size: Vec<Pair>,
    #[serde(default)]
    pub dropout_rate: f32,
}

impl BlockConfig for ConvBlockConfig {
    const NAME: &'static str = "simple_conv_block";
    const REQUIRED: &'static [&'static str] = &["filters", "pool_size"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        if self.filters.is_empty() {
            return Err(ConfigError::EmptyFilters { block });
        }
        if self.filters.len() != self.pool_size.len() {
            return Err(ConfigError::LengthMismatch {
                first: "filters",
                first_len: self.filters.len(),
                second: "pool_size",
                second_len: self.pool_size.len(),
            });
        }
        for &filters in &self.filters {
            check_positive(block, "filters", filters)?;
        }
        for pool in &self.pool_size {
            pool.check_nonzero(block, "pool_size")?;
        }
        check_rate(block, self.dropout_rate)
    }
}

fn default_routing_activation() -> Activation {
    Activation::Softmax
}

fn default_num_kernels() -> usize {
    4
}

fn default_num_experts() -> usize {
    8
}

/// Pooled conv block whose convolutions mix `num_kernels` kernels by attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicConvBlockConfig {
    #[serde(flatten)]
    pub base: ConvBlockConfig,
    /// Routing activation over the kernels.
    #[serde(default = "default_routing_activation")]
    pub activation: Activation,
    #[serde(default = "default_num_kernels")]
    pub num_kernels: usize,
}

impl BlockConfig for DynamicConvBlockConfig {
    const NAME: &'static str = "dynamic_conv_block";
    const REQUIRED: &'static [&'static str] = &["filters", "pool_size"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        self.base.validate(block)?;
        check_positive(block, "num_kernels", self.num_kernels)
    }
}

/// Pooled conv block with sigmoid-gated conditional convolutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondConvBlockConfig {
    #[serde(flatten)]
    pub base: ConvBlockConfig,
    #[serde(default = "default_num_experts")]
    pub num_experts: usize,
}

impl BlockConfig for CondConvBlockConfig {
    const NAME: &'static str = "cond_conv_block";
    const REQUIRED: &'static [&'static str] = &["filters", "pool_size"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        self.base.validate(block)?;
        check_positive(block, "num_experts", self.num_experts)
    }
}

/// `depth` same-padded 3x3 convolutions at a fixed width, then one pooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleConvStageConfig {
    pub filters: usize,
    pub depth: usize,
    pub pool_size: Pair,
    /// Pooling stride, defaults to `pool_size`.
    #[serde(default)]
    pub strides: Option<Pair>,
}

impl SimpleConvStageConfig {
    pub fn pool(&self) -> MaxPool2d {
        let pool = MaxPool2d::new(self.pool_size.dims());
        match self.strides {
            Some(strides) => pool.with_strides(strides.dims()),
            None => pool,
        }
    }
}

impl BlockConfig for SimpleConvStageConfig {
    const NAME: &'static str = "simple_conv_stage";
    const REQUIRED: &'static [&'static str] = &["filters", "depth", "pool_size"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "filters", self.filters)?;
        check_positive(block, "depth", self.depth)?;
        self.pool_size.check_nonzero(block, "pool_size")?;
        match self.strides {
            Some(strides) => strides.check_nonzero(block, "strides"),
            None => Ok(()),
        }
    }
}

pub(crate) fn same_conv3x3(filters: usize) -> Conv2d {
    Conv2d::new(filters, (3, 3)).with_padding(Padding::Same)
}

/// Builds `len(filters)` x (`convs` x (conv -> BN -> ReLU) -> MaxPool -> Dropout).
fn pooled_conv_block<C>(config: &ConvBlockConfig, convs: usize, conv: C) -> BlockFn
where
    C: Fn(usize) -> LayerKind + 'static,
{
    let stages: Vec<(usize, MaxPool2d)> = config
        .filters
        .iter()
        .zip(&config.pool_size)
        .map(|(&filters, pool)| (filters, MaxPool2d::new(pool.dims())))
        .collect();
    let dropout = Dropout::new(config.dropout_rate);

    Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        for (filters, pool) in &stages {
            for _ in 0..convs {
                x = x.apply(conv(*filters))?;
                x = BatchNorm::new().forward(&x)?;
                x = Activation::Relu.forward(&x)?;
            }
            x = pool.forward(&x)?;
            x = dropout.forward(&x)?;
        }
        Ok(x)
    })
}

pub fn simple_conv_block(config: &ConvBlockConfig) -> Result<BlockFn> {
    config.validate("simple_conv_block")?;
    Ok(pooled_conv_block(config, 1, |filters| same_conv3x3(filters).kind()))
}

pub fn dynamic_conv_block(config: &DynamicConvBlockConfig) -> Result<BlockFn> {
    config.validate(DynamicConvBlockConfig::NAME)?;
    let routing = config.activation;
    let num_kernels = config.num_kernels;
    Ok(pooled_conv_block(&config.base, 1, move |filters| {
        ExpertConv2d::new(filters, (3, 3), num_kernels, routing)
            .with_padding(Padding::Same)
            .kind()
    }))
}

pub fn cond_conv_block(config: &CondConvBlockConfig) -> Result<BlockFn> {
    config.validate(CondConvBlockConfig::NAME)?;
    let num_experts = config.num_experts;
    Ok(pooled_conv_block(&config.base, 1, move |filters| {
        ExpertConv2d::conditional(filters, (3, 3), num_experts)
            .with_padding(Padding::Same)
            .kind()
    }))
}

/// Like [`simple_conv_block`] with two conv/BN/ReLU layers before each pooling.
pub fn another_conv_block(config: &ConvBlockConfig) -> Result<BlockFn> {
    config.validate("another_conv_block")?;
    Ok(pooled_conv_block(config, 2, |filters| same_conv3x3(filters).kind()))
}

pub fn another_conv_stage(config: &ConvBlockConfig) -> Result<BlockFn> {
    config.validate("another_conv_stage")?;
    another_conv_block(config)
}

pub fn simple_conv_stage(config: &SimpleConvStageConfig) -> Result<BlockFn> {
    config.validate(SimpleConvStageConfig::NAME)?;
    let conv = same_conv3x3(config.filters);
    let depth = config.depth;
    let pool = config.pool();

    Ok(Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        for _ in 0..depth {
            x = conv.forward(&x)?;
            x = BatchNorm::new().forward(&x)?;
            x = Activation::Relu.forward(&x)?;
        }
        pool.forward(&x)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tensor::GraphContext;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn input(shape: Vec<usize>) -> Tensor {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        Tensor::new_input(&context, "input", shape)
    }

    #[test]
    fn test_simple_conv_block_output_shape() {
        let config = ConvBlockConfig::from_value(&json!({
            "filters": [16, 32],
            "pool_size": [2, 2],
        }))
        .unwrap();
        let block = simple_conv_block(&config).unwrap();
        let output = block(&input(vec![64, 64, 3])).unwrap();
        assert_eq!(output.shape().unwrap(), vec![16, 16, 32]);
    }

    #[test]
    fn test_conv_block_rejects_mismatched_lengths() {
        let config = ConvBlockConfig {
            filters: vec![16, 32, 64],
            pool_size: vec![Pair::Scalar(2), Pair::Scalar(2)],
            dropout_rate: 0.0,
        };
        assert!(matches!(
            simple_conv_block(&config),
            Err(Error::Config(ConfigError::LengthMismatch {
                first: "filters",
                first_len: 3,
                second: "pool_size",
                second_len: 2,
            }))
        ));
    }

    #[test]
    fn test_conv_block_rejects_empty_filters() {
        let err = ConvBlockConfig::from_value(&json!({ "filters": [], "pool_size": [] }))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyFilters { block: "simple_conv_block" }));
    }

    #[test]
    fn test_expert_conv_defaults() {
        let dynamic = DynamicConvBlockConfig::from_value(&json!({
            "filters": [8],
            "pool_size": [[2, 1]],
        }))
        .unwrap();
        assert_eq!(dynamic.num_kernels, 4);
        assert_eq!(dynamic.activation, Activation::Softmax);

        let cond =
            CondConvBlockConfig::from_value(&json!({ "filters": [8], "pool_size": [2] })).unwrap();
        assert_eq!(cond.num_experts, 8);

        let gated = DynamicConvBlockConfig::from_value(&json!({
            "filters": [8],
            "pool_size": [2],
            "activation": "relu",
        }))
        .unwrap();
        assert_eq!(gated.activation, Activation::Relu);
        let x = input(vec![8, 8, 2]);
        assert_eq!(dynamic_conv_block(&gated).unwrap()(&x).unwrap().shape().unwrap(), vec![4, 4, 8]);
    }

    #[test]
    fn test_another_conv_block_doubles_convs() {
        let config = ConvBlockConfig {
            filters: vec![4],
            pool_size: vec![Pair::Tuple(2, 1)],
            dropout_rate: 0.2,
        };
        let x = input(vec![8, 8, 2]);
        let output = another_conv_block(&config).unwrap()(&x).unwrap();
        assert_eq!(output.shape().unwrap(), vec![4, 8, 4]);
        // input + 2 x (conv, bn, relu) + pool + dropout
        assert_eq!(x.context.borrow().main_graph().nodes.len(), 9);
    }

    #[test]
    fn test_simple_conv_stage_pool_strides() {
        let config = SimpleConvStageConfig::from_value(&json!({
            "filters": 8,
            "depth": 2,
            "pool_size": 3,
            "strides": 1,
        }))
        .unwrap();
        let output = simple_conv_stage(&config).unwrap()(&input(vec![16, 16, 3])).unwrap();
        assert_eq!(output.shape().unwrap(), vec![14, 14, 8]);
    }
}
