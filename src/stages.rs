//! # Complexity Catalog
//!
//! One `<block>_complexity` function per constructor of [`crate::blocks`].
//! Each takes the same configuration plus an input shape (batch excluded,
//! channel last) and returns the block's cost and output shape.
//!
//! Single blocks are measured by tracing the constructed block over a fresh
//! graph, so both catalogs share one description of every layer. Stages that
//! repeat a block derive each iteration's configuration and sum the
//! per-block records.

use crate::analysis::trace;
use crate::blocks::{self, BlockFn};
use crate::complexity::{self, Conv2dSpec, Padding, Shape};
use crate::config::BlockConfig;
use crate::cost::{dict_add, Complexity};
use crate::error::Result;
use log::debug;

use crate::blocks::{
    BidirectionalGruBlockConfig, CondConvBlockConfig, ConvBlockConfig, DenseNetBlockConfig,
    DynamicConvBlockConfig, ResBasicBlockConfig, ResBasicStageConfig, ResBottleneckBlockConfig,
    ResBottleneckStageConfig, SepformerBlockConfig, SepformerStageConfig, SimpleConvStageConfig,
    SimpleDenseBlockConfig, TransformerEncoderLayerConfig, XceptionBlockConfig,
};

fn measure(name: &str, block: BlockFn, input_shape: &[usize]) -> Result<(Complexity, Shape)> {
    let (cx, shape) = trace(block.as_ref(), input_shape)?;
    debug!(
        "{}: {:?} -> {:?}, flops {}, params {}",
        name,
        input_shape,
        shape,
        cx.flops(),
        cx.params()
    );
    Ok((cx, shape))
}

pub fn simple_conv_block_complexity(
    config: &ConvBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("simple_conv_block", blocks::simple_conv_block(config)?, input_shape)
}

pub fn dynamic_conv_block_complexity(
    config: &DynamicConvBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("dynamic_conv_block", blocks::dynamic_conv_block(config)?, input_shape)
}

pub fn cond_conv_block_complexity(
    config: &CondConvBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("cond_conv_block", blocks::cond_conv_block(config)?, input_shape)
}

pub fn another_conv_block_complexity(
    config: &ConvBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("another_conv_block", blocks::another_conv_block(config)?, input_shape)
}

pub fn another_conv_stage_complexity(
    config: &ConvBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    another_conv_block_complexity(config, input_shape)
}

/// `depth` x (conv, norm) at constant resolution, then one pooling.
pub fn simple_conv_stage_complexity(
    config: &SimpleConvStageConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    config.validate(SimpleConvStageConfig::NAME)?;
    let conv = Conv2dSpec {
        padding: Padding::Same,
        ..Conv2dSpec::new(config.filters, (3, 3))
    };

    let mut cx = Complexity::new();
    let mut shape = input_shape.to_vec();
    for _ in 0..config.depth {
        (cx, shape) = complexity::conv2d_complexity(&shape, &conv, Some(&cx))?;
        (cx, shape) = complexity::norm_complexity(&shape, Some(&cx))?;
    }
    let (cx, shape) = complexity::pool2d_complexity(&shape, &config.pool().spec, Some(&cx))?;
    debug!("simple_conv_stage: {:?} -> {:?}, flops {}", input_shape, shape, cx.flops());
    Ok((cx, shape))
}

pub fn res_basic_block_complexity(
    config: &ResBasicBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("res_basic_block", blocks::res_basic_block(config)?, input_shape)
}

pub fn res_basic_stage_complexity(
    config: &ResBasicStageConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    config.validate(ResBasicStageConfig::NAME)?;
    let mut shape = input_shape.to_vec();
    let mut total_cx = Complexity::new();
    for i in 0..config.depth {
        let (cx, next) = res_basic_block_complexity(&config.block_at(i), &shape)?;
        total_cx = dict_add(&total_cx, &cx);
        shape = next;
    }
    Ok((total_cx, shape))
}

pub fn res_bottleneck_block_complexity(
    config: &ResBottleneckBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("res_bottleneck_block", blocks::res_bottleneck_block(config)?, input_shape)
}

pub fn res_bottleneck_stage_complexity(
    config: &ResBottleneckStageConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    config.validate(ResBottleneckStageConfig::NAME)?;
    let mut shape = input_shape.to_vec();
    let mut total_cx = Complexity::new();
    for i in 0..config.depth {
        let (cx, next) = res_bottleneck_block_complexity(&config.block_at(i), &shape)?;
        total_cx = dict_add(&total_cx, &cx);
        shape = next;
    }
    Ok((total_cx, shape))
}

pub fn dense_net_block_complexity(
    config: &DenseNetBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("dense_net_block", blocks::dense_net_block(config)?, input_shape)
}

pub fn dense_net_stage_complexity(
    config: &DenseNetBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    dense_net_block_complexity(config, input_shape)
}

pub fn bidirectional_gru_block_complexity(
    config: &BidirectionalGruBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("bidirectional_GRU_block", blocks::bidirectional_gru_block(config)?, input_shape)
}

pub fn transformer_encoder_layer_complexity(
    config: &TransformerEncoderLayerConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure(
        "transformer_encoder_layer",
        blocks::transformer_encoder_layer(config)?,
        input_shape,
    )
}

pub fn sepformer_block_complexity(
    config: &SepformerBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("sepformer_block", blocks::sepformer_block(config)?, input_shape)
}

pub fn sepformer_stage_complexity(
    config: &SepformerStageConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    config.validate(SepformerStageConfig::NAME)?;
    let mut shape = input_shape.to_vec();
    let mut total_cx = Complexity::new();
    for _ in 0..config.depth {
        let (cx, next) = sepformer_block_complexity(&config.block, &shape)?;
        total_cx = dict_add(&total_cx, &cx);
        shape = next;
    }
    Ok((total_cx, shape))
}

pub fn simple_dense_block_complexity(
    config: &SimpleDenseBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure("simple_dense_block", blocks::simple_dense_block(config)?, input_shape)
}

pub fn xception_block_complexity(
    config: &XceptionBlockConfig,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    measure(
        "timedistributed_xception_block",
        blocks::timedistributed_xception_block(config)?,
        input_shape,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pair;
    use crate::nn::Activation;

    #[test]
    fn test_simple_conv_stage_matches_traced_block() {
        let config = SimpleConvStageConfig {
            filters: 8,
            depth: 2,
            pool_size: Pair::Scalar(2),
            strides: None,
        };
        let direct = simple_conv_stage_complexity(&config, &[16, 16, 3]).unwrap();
        let traced = trace(blocks::simple_conv_stage(&config).unwrap().as_ref(), &[16, 16, 3]).unwrap();
        assert_eq!(direct, traced);
        assert_eq!(direct.1, vec![8, 8, 8]);
    }

    #[test]
    fn test_residual_stage_matches_traced_stage() {
        let config = ResBasicStageConfig {
            depth: 3,
            block: ResBasicBlockConfig {
                filters: 8,
                strides: Pair::Tuple(2, 2),
                activation: Activation::Relu,
            },
        };
        let summed = res_basic_stage_complexity(&config, &[9, 9, 4]).unwrap();
        let traced = trace(blocks::res_basic_stage(&config).unwrap().as_ref(), &[9, 9, 4]).unwrap();
        assert_eq!(summed, traced);
        assert_eq!(summed.1, vec![5, 5, 8]);
    }

    #[test]
    fn test_delegating_stages() {
        let config = ConvBlockConfig {
            filters: vec![4],
            pool_size: vec![Pair::Scalar(2)],
            dropout_rate: 0.0,
        };
        assert_eq!(
            another_conv_stage_complexity(&config, &[8, 8, 1]).unwrap(),
            another_conv_block_complexity(&config, &[8, 8, 1]).unwrap()
        );
    }
}
