//! Name-based dispatch over both catalogs.
//!
//! A model-assembly layer describes a network as a list of
//! `(block name, configuration mapping)` pairs. [`StageConfig`] parses one such
//! pair into the matching typed configuration and can then build the block or
//! compute its complexity.

use crate::blocks::{self, BlockFn};
use crate::blocks::{
    BidirectionalGruBlockConfig, CondConvBlockConfig, ConvBlockConfig, DenseNetBlockConfig,
    DynamicConvBlockConfig, ResBasicBlockConfig, ResBasicStageConfig, ResBottleneckBlockConfig,
    ResBottleneckStageConfig, SepformerBlockConfig, SepformerStageConfig, SimpleConvStageConfig,
    SimpleDenseBlockConfig, TransformerEncoderLayerConfig, XceptionBlockConfig,
};
use crate::complexity::Shape;
use crate::config::{BlockConfig, ConfigError, ConfigResult};
use crate::cost::{dict_add, Complexity};
use crate::error::Result;
use crate::stages;
use crate::tensor::Tensor;
use log::debug;
use serde_json::Value;

/// Every block name the catalogs know.
pub const BLOCK_NAMES: [&str; 18] = [
    "simple_conv_block",
    "dynamic_conv_block",
    "cond_conv_block",
    "another_conv_block",
    "another_conv_stage",
    "simple_conv_stage",
    "res_basic_block",
    "res_basic_stage",
    "res_bottleneck_block",
    "res_bottleneck_stage",
    "dense_net_block",
    "dense_net_stage",
    "bidirectional_GRU_block",
    "transformer_encoder_layer",
    "sepformer_block",
    "sepformer_stage",
    "simple_dense_block",
    "timedistributed_xception_block",
];

/// A parsed configuration tagged with the block it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum StageConfig {
    SimpleConvBlock(ConvBlockConfig),
    DynamicConvBlock(DynamicConvBlockConfig),
    CondConvBlock(CondConvBlockConfig),
    AnotherConvBlock(ConvBlockConfig),
    AnotherConvStage(ConvBlockConfig),
    SimpleConvStage(SimpleConvStageConfig),
    ResBasicBlock(ResBasicBlockConfig),
    ResBasicStage(ResBasicStageConfig),
    ResBottleneckBlock(ResBottleneckBlockConfig),
    ResBottleneckStage(ResBottleneckStageConfig),
    DenseNetBlock(DenseNetBlockConfig),
    DenseNetStage(DenseNetBlockConfig),
    BidirectionalGruBlock(BidirectionalGruBlockConfig),
    TransformerEncoderLayer(TransformerEncoderLayerConfig),
    SepformerBlock(SepformerBlockConfig),
    SepformerStage(SepformerStageConfig),
    SimpleDenseBlock(SimpleDenseBlockConfig),
    XceptionBlock(XceptionBlockConfig),
}

impl StageConfig {
    /// Parses `value` as the configuration of the block called `name`.
    pub fn from_value(name: &str, value: &Value) -> ConfigResult<Self> {
        use StageConfig::*;
        let config = match name {
            "simple_conv_block" => {
                SimpleConvBlock(ConvBlockConfig::from_named_value("simple_conv_block", value)?)
            }
            "dynamic_conv_block" => DynamicConvBlock(DynamicConvBlockConfig::from_value(value)?),
            "cond_conv_block" => CondConvBlock(CondConvBlockConfig::from_value(value)?),
            "another_conv_block" => {
                AnotherConvBlock(ConvBlockConfig::from_named_value("another_conv_block", value)?)
            }
            "another_conv_stage" => {
                AnotherConvStage(ConvBlockConfig::from_named_value("another_conv_stage", value)?)
            }
            "simple_conv_stage" => SimpleConvStage(SimpleConvStageConfig::from_value(value)?),
            "res_basic_block" => ResBasicBlock(ResBasicBlockConfig::from_value(value)?),
            "res_basic_stage" => ResBasicStage(ResBasicStageConfig::from_value(value)?),
            "res_bottleneck_block" => {
                ResBottleneckBlock(ResBottleneckBlockConfig::from_value(value)?)
            }
            "res_bottleneck_stage" => {
                ResBottleneckStage(ResBottleneckStageConfig::from_value(value)?)
            }
            "dense_net_block" => DenseNetBlock(DenseNetBlockConfig::from_value(value)?),
            "dense_net_stage" => {
                DenseNetStage(DenseNetBlockConfig::from_named_value("dense_net_stage", value)?)
            }
            "bidirectional_GRU_block" => {
                BidirectionalGruBlock(BidirectionalGruBlockConfig::from_value(value)?)
            }
            "transformer_encoder_layer" => {
                TransformerEncoderLayer(TransformerEncoderLayerConfig::from_value(value)?)
            }
            "sepformer_block" => SepformerBlock(SepformerBlockConfig::from_value(value)?),
            "sepformer_stage" => SepformerStage(SepformerStageConfig::from_value(value)?),
            "simple_dense_block" => SimpleDenseBlock(SimpleDenseBlockConfig::from_value(value)?),
            "timedistributed_xception_block" => {
                XceptionBlock(XceptionBlockConfig::from_value(value)?)
            }
            other => return Err(ConfigError::UnknownBlock(other.to_string())),
        };
        Ok(config)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageConfig::SimpleConvBlock(_) => "simple_conv_block",
            StageConfig::DynamicConvBlock(_) => "dynamic_conv_block",
            StageConfig::CondConvBlock(_) => "cond_conv_block",
            StageConfig::AnotherConvBlock(_) => "another_conv_block",
            StageConfig::AnotherConvStage(_) => "another_conv_stage",
            StageConfig::SimpleConvStage(_) => "simple_conv_stage",
            StageConfig::ResBasicBlock(_) => "res_basic_block",
            StageConfig::ResBasicStage(_) => "res_basic_stage",
            StageConfig::ResBottleneckBlock(_) => "res_bottleneck_block",
            StageConfig::ResBottleneckStage(_) => "res_bottleneck_stage",
            StageConfig::DenseNetBlock(_) => "dense_net_block",
            StageConfig::DenseNetStage(_) => "dense_net_stage",
            StageConfig::BidirectionalGruBlock(_) => "bidirectional_GRU_block",
            StageConfig::TransformerEncoderLayer(_) => "transformer_encoder_layer",
            StageConfig::SepformerBlock(_) => "sepformer_block",
            StageConfig::SepformerStage(_) => "sepformer_stage",
            StageConfig::SimpleDenseBlock(_) => "simple_dense_block",
            StageConfig::XceptionBlock(_) => "timedistributed_xception_block",
        }
    }

    /// Builds the block from the Block Catalog.
    pub fn block(&self) -> Result<BlockFn> {
        match self {
            StageConfig::SimpleConvBlock(c) => blocks::simple_conv_block(c),
            StageConfig::DynamicConvBlock(c) => blocks::dynamic_conv_block(c),
            StageConfig::CondConvBlock(c) => blocks::cond_conv_block(c),
            StageConfig::AnotherConvBlock(c) => blocks::another_conv_block(c),
            StageConfig::AnotherConvStage(c) => blocks::another_conv_stage(c),
            StageConfig::SimpleConvStage(c) => blocks::simple_conv_stage(c),
            StageConfig::ResBasicBlock(c) => blocks::res_basic_block(c),
            StageConfig::ResBasicStage(c) => blocks::res_basic_stage(c),
            StageConfig::ResBottleneckBlock(c) => blocks::res_bottleneck_block(c),
            StageConfig::ResBottleneckStage(c) => blocks::res_bottleneck_stage(c),
            StageConfig::DenseNetBlock(c) => blocks::dense_net_block(c),
            StageConfig::DenseNetStage(c) => blocks::dense_net_stage(c),
            StageConfig::BidirectionalGruBlock(c) => blocks::bidirectional_gru_block(c),
            StageConfig::TransformerEncoderLayer(c) => blocks::transformer_encoder_layer(c),
            StageConfig::SepformerBlock(c) => blocks::sepformer_block(c),
            StageConfig::SepformerStage(c) => blocks::sepformer_stage(c),
            StageConfig::SimpleDenseBlock(c) => blocks::simple_dense_block(c),
            StageConfig::XceptionBlock(c) => blocks::timedistributed_xception_block(c),
        }
    }

    /// Cost and output shape from the Complexity Catalog.
    pub fn complexity(&self, input_shape: &[usize]) -> Result<(Complexity, Shape)> {
        match self {
            StageConfig::SimpleConvBlock(c) => stages::simple_conv_block_complexity(c, input_shape),
            StageConfig::DynamicConvBlock(c) => {
                stages::dynamic_conv_block_complexity(c, input_shape)
            }
            StageConfig::CondConvBlock(c) => stages::cond_conv_block_complexity(c, input_shape),
            StageConfig::AnotherConvBlock(c) => {
                stages::another_conv_block_complexity(c, input_shape)
            }
            StageConfig::AnotherConvStage(c) => {
                stages::another_conv_stage_complexity(c, input_shape)
            }
            StageConfig::SimpleConvStage(c) => stages::simple_conv_stage_complexity(c, input_shape),
            StageConfig::ResBasicBlock(c) => stages::res_basic_block_complexity(c, input_shape),
            StageConfig::ResBasicStage(c) => stages::res_basic_stage_complexity(c, input_shape),
            StageConfig::ResBottleneckBlock(c) => {
                stages::res_bottleneck_block_complexity(c, input_shape)
            }
            StageConfig::ResBottleneckStage(c) => {
                stages::res_bottleneck_stage_complexity(c, input_shape)
            }
            StageConfig::DenseNetBlock(c) => stages::dense_net_block_complexity(c, input_shape),
            StageConfig::DenseNetStage(c) => stages::dense_net_stage_complexity(c, input_shape),
            StageConfig::BidirectionalGruBlock(c) => {
                stages::bidirectional_gru_block_complexity(c, input_shape)
            }
            StageConfig::TransformerEncoderLayer(c) => {
                stages::transformer_encoder_layer_complexity(c, input_shape)
            }
            StageConfig::SepformerBlock(c) => stages::sepformer_block_complexity(c, input_shape),
            StageConfig::SepformerStage(c) => stages::sepformer_stage_complexity(c, input_shape),
            StageConfig::SimpleDenseBlock(c) => {
                stages::simple_dense_block_complexity(c, input_shape)
            }
            StageConfig::XceptionBlock(c) => stages::xception_block_complexity(c, input_shape),
        }
    }
}

/// Parses and measures one block in a single call.
pub fn complexity_by_name(
    name: &str,
    config: &Value,
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    StageConfig::from_value(name, config)?.complexity(input_shape)
}

/// Total cost of running `stages` one after another, and the final shape.
pub fn sequence_complexity(
    stages: &[StageConfig],
    input_shape: &[usize],
) -> Result<(Complexity, Shape)> {
    let mut shape = input_shape.to_vec();
    let mut total_cx = Complexity::new();
    for (i, stage) in stages.iter().enumerate() {
        let (cx, next) = stage.complexity(&shape)?;
        debug!(
            "stage {} ({}): {:?} -> {:?}, flops {}, params {}",
            i,
            stage.name(),
            shape,
            next,
            cx.flops(),
            cx.params()
        );
        total_cx = dict_add(&total_cx, &cx);
        shape = next;
    }
    Ok((total_cx, shape))
}

/// Chains the blocks of `stages` into one block.
pub fn sequence_block(stages: &[StageConfig]) -> Result<BlockFn> {
    let blocks = stages
        .iter()
        .map(StageConfig::block)
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        for block in &blocks {
            x = block(&x)?;
        }
        Ok(x)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn test_names_round_trip() {
        let config = StageConfig::from_value("dense_net_stage", &json!({ "growth_rate": 4, "depth": 1 }))
            .unwrap();
        assert_eq!(config.name(), "dense_net_stage");
        assert!(BLOCK_NAMES.contains(&config.name()));
    }

    #[test]
    fn test_unknown_block() {
        assert!(matches!(
            StageConfig::from_value("mystery_block", &json!({})),
            Err(ConfigError::UnknownBlock(name)) if name == "mystery_block"
        ));
    }

    #[test]
    fn test_missing_key_names_the_block_it_was_parsed_for() {
        let err = complexity_by_name("another_conv_stage", &json!({ "filters": [4] }), &[8, 8, 1])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingKey {
                block: "another_conv_stage",
                key: "pool_size",
            })
        ));
    }

    #[test]
    fn test_empty_sequence_is_free() {
        let (cx, shape) = sequence_complexity(&[], &[4, 4, 1]).unwrap();
        assert!(cx.is_empty());
        assert_eq!(shape, vec![4, 4, 1]);
    }
}
