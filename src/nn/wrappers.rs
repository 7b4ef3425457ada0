//! Layer wrappers.

use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// Applies the wrapped layer independently to every slice along axis 0,
/// sharing its weights between slices.
///
/// ```rust,ignore
/// // [T, H, W, C] -> [T, H', W', 32]
/// let conv = TimeDistributed::new(&Conv2d::new(32, (3, 3)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeDistributed {
    inner: LayerKind,
}

impl TimeDistributed {
    pub fn new(layer: &impl Layer) -> Self {
        Self { inner: layer.kind() }
    }
}

impl Layer for TimeDistributed {
    fn kind(&self) -> LayerKind {
        LayerKind::TimeDistributed(Box::new(self.inner.clone()))
    }
}

impl Module for TimeDistributed {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}
