//! Module containing element-wise activation layers.

use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Element-wise activation function.
///
/// Activations have no trainable parameters and add no cost; they are kept
/// in the graph so that traced blocks mirror the real layer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
    Elu,
    Gelu,
    Swish,
    Linear,
}

impl Layer for Activation {
    fn kind(&self) -> LayerKind {
        LayerKind::Activation(*self)
    }
}

impl Module for Activation {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_names_deserialize() {
        let act: Activation = serde_json::from_str("\"softmax\"").unwrap();
        assert_eq!(act, Activation::Softmax);
        assert!(serde_json::from_str::<Activation>("\"mish\"").is_err());
    }
}
