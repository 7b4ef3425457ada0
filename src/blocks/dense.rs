//! Per-step dense classifier head.

use crate::blocks::BlockFn;
use crate::config::{check_positive, check_rate, BlockConfig, ConfigResult};
use crate::error::Result;
use crate::graph::LayerKind;
use crate::nn::{Activation, Dense, Dropout, Layer, Module, TimeDistributed};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleDenseBlockConfig {
    /// Hidden widths; may be empty.
    pub units: Vec<usize>,
    pub n_classes: usize,
    /// Name given to the output node.
    #[serde(default)]
    pub name: Option<String>,
    /// Output activation, none by default.
    #[serde(default)]
    pub activation: Option<Activation>,
    #[serde(default)]
    pub dropout_rate: f32,
}

impl BlockConfig for SimpleDenseBlockConfig {
    const NAME: &'static str = "simple_dense_block";
    const REQUIRED: &'static [&'static str] = &["units", "n_classes"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        for &units in &self.units {
            check_positive(block, "units", units)?;
        }
        check_positive(block, "n_classes", self.n_classes)?;
        check_rate(block, self.dropout_rate)
    }
}

/// Hidden `TimeDistributed(Dense)` layers with dropout, then a
/// `TimeDistributed(Dense(n_classes))` output.
pub fn simple_dense_block(config: &SimpleDenseBlockConfig) -> Result<BlockFn> {
    config.validate(SimpleDenseBlockConfig::NAME)?;
    let hidden: Vec<TimeDistributed> = config
        .units
        .iter()
        .map(|&units| TimeDistributed::new(&Dense::new(units)))
        .collect();
    let dropout = Dropout::new(config.dropout_rate);
    let output = TimeDistributed::new(&Dense::new(config.n_classes)).kind();
    let activation = config.activation;
    let name = config.name.clone();

    Ok(Box::new(move |inputs: &Tensor| {
        let mut x = inputs.clone();
        for layer in &hidden {
            x = layer.forward(&x)?;
            x = dropout.forward(&x)?;
        }
        match activation {
            Some(act) => {
                let logits = x.apply(output.clone())?;
                logits.apply_named(name.as_deref(), LayerKind::Activation(act))
            }
            None => x.apply_named(name.as_deref(), output.clone()),
        }
    }))
}
