//! Batch normalization layer.

use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// Batch normalization over the channel (last) axis.
///
/// Holds gamma, beta and the moving mean/variance for every channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchNorm;

impl BatchNorm {
    pub fn new() -> Self {
        BatchNorm
    }
}

impl Layer for BatchNorm {
    fn kind(&self) -> LayerKind {
        LayerKind::BatchNorm
    }
}

impl Module for BatchNorm {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::GraphContext;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_batchnorm_keeps_shape_on_any_rank() {
        let ctx = Rc::new(RefCell::new(GraphContext::new()));
        let x = Tensor::new_input(&ctx, "x", vec![20, 31, 3, 8]);
        let y = BatchNorm::new().forward(&x).unwrap();
        assert_eq!(y.shape().unwrap(), vec![20, 31, 3, 8]);
    }
}
