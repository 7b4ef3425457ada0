//! Sequence blocks: recurrent stacks and Transformer encoders.

use crate::blocks::BlockFn;
use crate::complexity::{AttentionAxes, MergeMode};
use crate::config::{check_positive, check_rate, BlockConfig, ConfigError, ConfigResult};
use crate::error::Result;
use crate::nn::{Activation, Bidirectional, Gru, Module, TransformerEncoderLayer};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Stack of bidirectional GRUs, one per entry of `units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidirectionalGruBlockConfig {
    pub units: Vec<usize>,
    /// Input and recurrent dropout of the GRUs. Adds no layer to the graph.
    #[serde(default)]
    pub dropout_rate: f32,
    #[serde(default)]
    pub merge_mode: MergeMode,
}

impl BlockConfig for BidirectionalGruBlockConfig {
    const NAME: &'static str = "bidirectional_GRU_block";
    const REQUIRED: &'static [&'static str] = &["units"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        if self.units.is_empty() {
            return Err(ConfigError::InvalidParameter {
                block,
                reason: "units must not be empty".to_string(),
            });
        }
        for &units in &self.units {
            check_positive(block, "units", units)?;
        }
        check_rate(block, self.dropout_rate)
    }
}

/// `[T, F, C]` inputs are flattened to `[T, F * C]` before the first GRU.
pub fn bidirectional_gru_block(config: &BidirectionalGruBlockConfig) -> Result<BlockFn> {
    config.validate(BidirectionalGruBlockConfig::NAME)?;
    let layers: Vec<Bidirectional> = config
        .units
        .iter()
        .map(|&units| Bidirectional::new(Gru::new(units), config.merge_mode))
        .collect();

    Ok(Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        let shape = x.shape()?;
        if let [_, freq, chan] = shape[..] {
            x = x.reshape(vec![-1, (freq * chan) as i64])?;
        }
        for layer in &layers {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }))
}

fn default_dropout() -> f32 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerEncoderLayerConfig {
    pub d_model: usize,
    pub n_head: usize,
    #[serde(default)]
    pub activation: Activation,
    /// Defaults to `4 * d_model`.
    #[serde(default)]
    pub dim_feedforward: Option<usize>,
    #[serde(default = "default_dropout")]
    pub dropout_rate: f32,
}

impl TransformerEncoderLayerConfig {
    pub fn dim_feedforward(&self) -> usize {
        self.dim_feedforward.unwrap_or(4 * self.d_model)
    }

    pub fn layer(&self) -> TransformerEncoderLayer {
        TransformerEncoderLayer::new(
            self.d_model,
            self.n_head,
            self.dim_feedforward(),
            self.activation,
            self.dropout_rate,
        )
    }
}

impl BlockConfig for TransformerEncoderLayerConfig {
    const NAME: &'static str = "transformer_encoder_layer";
    const REQUIRED: &'static [&'static str] = &["d_model", "n_head"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "d_model", self.d_model)?;
        check_positive(block, "n_head", self.n_head)?;
        if self.n_head > self.d_model {
            return Err(ConfigError::InvalidParameter {
                block,
                reason: format!(
                    "n_head ({}) must not exceed d_model ({})",
                    self.n_head, self.d_model
                ),
            });
        }
        check_positive(block, "dim_feedforward", self.dim_feedforward())?;
        check_rate(block, self.dropout_rate)
    }
}

pub fn transformer_encoder_layer(config: &TransformerEncoderLayerConfig) -> Result<BlockFn> {
    config.validate(TransformerEncoderLayerConfig::NAME)?;
    let layer = config.layer();
    Ok(Box::new(move |inputs: &Tensor| layer.forward(inputs)))
}

/// Dual-path Transformer over `[T, F, C]` inputs: an intra-chunk encoder
/// attends along `F` for every `T`, an inter-chunk encoder along `T` for
/// every `F`. Each path has a residual connection.
///
/// Unlike [`transformer_encoder_layer`], each encoder attends along a single
/// axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepformerBlockConfig {
    #[serde(flatten)]
    pub encoder: TransformerEncoderLayerConfig,
}

impl BlockConfig for SepformerBlockConfig {
    const NAME: &'static str = "sepformer_block";
    const REQUIRED: &'static [&'static str] = &["d_model", "n_head"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        self.encoder.validate(block)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepformerStageConfig {
    pub depth: usize,
    #[serde(flatten)]
    pub block: SepformerBlockConfig,
}

impl BlockConfig for SepformerStageConfig {
    const NAME: &'static str = "sepformer_stage";
    const REQUIRED: &'static [&'static str] = &["depth", "d_model", "n_head"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "depth", self.depth)?;
        self.block.validate(block)
    }
}

const SWAP_LEADING: [usize; 3] = [1, 0, 2];

pub fn sepformer_block(config: &SepformerBlockConfig) -> Result<BlockFn> {
    config.validate(SepformerBlockConfig::NAME)?;
    let intra = config.encoder.layer().with_attention_axes(AttentionAxes::Sequence);
    let inter = config.encoder.layer().with_attention_axes(AttentionAxes::Sequence);

    Ok(Box::new(move |inputs: &Tensor| {
        let x = (inputs + &intra.forward(inputs)?)?;
        let x = x.permute(SWAP_LEADING.to_vec())?;
        let x = (&x + &inter.forward(&x)?)?;
        x.permute(SWAP_LEADING.to_vec())
    }))
}

pub fn sepformer_stage(config: &SepformerStageConfig) -> Result<BlockFn> {
    config.validate(SepformerStageConfig::NAME)?;
    let blocks = (0..config.depth)
        .map(|_| sepformer_block(&config.block))
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
    use crate::graph::GraphError;
    use crate::tensor::GraphContext;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn input(shape: Vec<usize>) -> Tensor {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        Tensor::new_input(&context, "input", shape)
    }

    #[test]
    fn test_gru_block_flattens_rank_three_inputs() {
        let config = BidirectionalGruBlockConfig::from_value(&json!({ "units": [8] })).unwrap();
        assert_eq!(config.merge_mode, MergeMode::Mul);
        let y = bidirectional_gru_block(&config).unwrap()(&input(vec![10, 4, 2])).unwrap();
        assert_eq!(y.shape().unwrap(), vec![10, 8]);

        let concat = BidirectionalGruBlockConfig {
            merge_mode: MergeMode::Concat,
            ..config
        };
        let y = bidirectional_gru_block(&concat).unwrap()(&input(vec![10, 4, 2])).unwrap();
        assert_eq!(y.shape().unwrap(), vec![10, 16]);
    }

    #[test]
    fn test_gru_block_rejects_empty_units() {
        let result = BidirectionalGruBlockConfig::from_value(&json!({ "units": [] }));
        assert!(matches!(result, Err(ConfigError::InvalidParameter { .. })));
    }

    #[test]
    fn test_transformer_defaults() {
        let config =
            TransformerEncoderLayerConfig::from_value(&json!({ "d_model": 8, "n_head": 2 }))
                .unwrap();
        assert_eq!(config.dim_feedforward(), 32);
        assert_eq!(config.dropout_rate, 0.1);
        assert_eq!(config.activation, Activation::Relu);
    }

    #[test]
    fn test_transformer_asserts_channels() {
        let config =
            TransformerEncoderLayerConfig::from_value(&json!({ "d_model": 8, "n_head": 2 }))
                .unwrap();
        let block = transformer_encoder_layer(&config).unwrap();
        assert!(matches!(
            block(&input(vec![10, 6])),
            Err(GraphError::ChannelMismatch { expected: 8, actual: 6, .. })
        ));
    }

    #[test]
    fn test_sepformer_keeps_shape() {
        let config = SepformerStageConfig::from_value(&json!({
            "depth": 2,
            "d_model": 8,
            "n_head": 2,
        }))
        .unwrap();
        let y = sepformer_stage(&config).unwrap()(&input(vec![4, 5, 8])).unwrap();
        assert_eq!(y.shape().unwrap(), vec![4, 5, 8]);
    }

    #[test]
    fn test_sepformer_rejects_missing_key() {
        let result = SepformerStageConfig::from_value(&json!({ "d_model": 8, "n_head": 2 }));
        assert!(matches!(result, Err(ConfigError::MissingKey { key: "depth", .. })));
        assert!(matches!(
            sepformer_block(&SepformerBlockConfig {
                encoder: TransformerEncoderLayerConfig {
                    d_model: 4,
                    n_head: 8,
                    activation: Activation::Relu,
                    dim_feedforward: None,
                    dropout_rate: 0.0,
                },
            }),
            Err(Error::Config(ConfigError::InvalidParameter { .. }))
        ));
    }
}
