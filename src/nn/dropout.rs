//! Dropout layer for regularization.
//!
//! Dropout only matters during training; in the graph it is a shape-preserving
//! node with no cost.

use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// Dropout with drop probability `rate` in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub rate: f32,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }
}

impl Layer for Dropout {
    fn kind(&self) -> LayerKind {
        LayerKind::Dropout { rate: self.rate }
    }
}

impl Module for Dropout {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}
