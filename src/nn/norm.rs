use crate::graph::{GraphResult, LayerKind};
use crate::tensor::Tensor;

use super::module::{Layer, Module};

/// Layer normalization over the last axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerNorm;

impl LayerNorm {
    pub fn new() -> Self {
        LayerNorm
    }
}

impl Layer for LayerNorm {
    fn kind(&self) -> LayerKind {
        LayerKind::LayerNorm
    }
}

impl Module for LayerNorm {
    fn forward(&self, input: &Tensor) -> GraphResult<Tensor> {
        input.apply(self.kind())
    }
}
