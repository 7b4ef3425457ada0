//! Module implementing pooling layers for CNNs.

use crate::complexity::{Padding, Pool2dSpec};
use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// Max Pooling 2D layer.
///
/// Applies max pooling to an input of shape `[H, W, C]`.
///
/// # Example
///
/// ```rust,ignore
/// let pool = MaxPool2d::new((2, 2));
/// let output = pool.forward(&input)?; // Reduces H and W by half
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    pub spec: Pool2dSpec,
}

impl MaxPool2d {
    /// Creates MaxPool2d with stride equal to `pool_size`.
    pub fn new(pool_size: (usize, usize)) -> Self {
        Self {
            spec: Pool2dSpec::new(pool_size),
        }
    }

    pub fn with_strides(mut self, strides: (usize, usize)) -> Self {
        self.spec.strides = Some(strides);
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.spec.padding = padding;
        self
    }
}

impl Layer for MaxPool2d {
    fn kind(&self) -> LayerKind {
        LayerKind::MaxPool2d(self.spec)
    }
}

impl Module for MaxPool2d {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

/// Average Pooling 2D layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvgPool2d {
    pub spec: Pool2dSpec,
}

impl AvgPool2d {
    pub fn new(pool_size: (usize, usize)) -> Self {
        Self {
            spec: Pool2dSpec::new(pool_size),
        }
    }

    pub fn with_strides(mut self, strides: (usize, usize)) -> Self {
        self.spec.strides = Some(strides);
        self
    }
}

impl Layer for AvgPool2d {
    fn kind(&self) -> LayerKind {
        LayerKind::AvgPool2d(self.spec)
    }
}

impl Module for AvgPool2d {
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
    fn test_max_pool2d() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![9, 9, 4]);
        let output = MaxPool2d::new((2, 2)).forward(&input).unwrap();
        assert_eq!(output.shape().unwrap(), vec![4, 4, 4]);
    }

    #[test]
    fn test_avg_pool2d_with_strides() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![8, 8, 4]);
        let output = AvgPool2d::new((3, 3)).with_strides((1, 1)).forward(&input).unwrap();
        assert_eq!(output.shape().unwrap(), vec![6, 6, 4]);
    }
}
