//! Module implementing the fully connected (dense) layer.

use crate::graph::{GraphResult, LayerKind};
use crate::nn::activations::Activation;
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// Fully connected layer applied to the last axis: `y = act(xW + b)`.
///
/// Leading axes are treated as independent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dense {
    pub units: usize,
    pub use_bias: bool,
    /// Applied as a separate node after the projection.
    pub activation: Option<Activation>,
}

impl Dense {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            use_bias: true,
            activation: None,
        }
    }

    pub fn with_activation(mut self, activation: Option<Activation>) -> Self {
        self.activation = activation;
        self
    }
}

impl Layer for Dense {
    /// The projection alone, without the activation.
    fn kind(&self) -> LayerKind {
        LayerKind::Dense {
            units: self.units,
            use_bias: self.use_bias,
        }
    }
}

impl Module for Dense {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        let projected = inputs.apply(self.kind())?;
        match self.activation {
            Some(act) => act.forward(&projected),
            None => Ok(projected),
        }
    }
}
