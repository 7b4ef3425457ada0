//! Module implementing convolutional layers for `[H, W, C]` feature maps.

use crate::complexity::{Conv2dSpec, ExpertConv2dSpec, Padding, SeparableConv2dSpec};
use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::nn::Activation;
use crate::tensor::Tensor;

/// 2D convolutional layer.
///
/// Maps `[H, W, C_in]` to `[H_out, W_out, filters]`. Defaults follow the
/// usual Keras layer: stride 1, `valid` padding, one group, bias enabled.
///
/// # Example
///
/// ```rust,ignore
/// use rustycx::nn::{Conv2d, Module};
///
/// let conv = Conv2d::new(64, (3, 3)).with_padding(Padding::Same);
/// let output = conv.forward(&input)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2d {
    pub spec: Conv2dSpec,
}

impl Conv2d {
    /// Creates a new Conv2d layer.
    ///
    /// # Arguments
    ///
    /// * `filters` - Number of output channels
    /// * `kernel_size` - Kernel size (kH, kW)
    pub fn new(filters: usize, kernel_size: (usize, usize)) -> Self {
        Self {
            spec: Conv2dSpec::new(filters, kernel_size),
        }
    }

    /// Sets convolution stride.
    pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
        self.spec.strides = stride;
        self
    }

    /// Sets padding.
    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.spec.padding = padding;
        self
    }

    /// Sets number of groups.
    pub fn with_groups(mut self, groups: usize) -> Self {
        self.spec.groups = groups;
        self
    }

    /// Enables/disables bias.
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.spec.use_bias = bias;
        self
    }
}

impl Layer for Conv2d {
    fn kind(&self) -> LayerKind {
        LayerKind::Conv2d(self.spec)
    }
}

impl Module for Conv2d {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

/// Depthwise-separable convolution: a per-channel spatial convolution
/// followed by a 1x1 pointwise projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparableConv2d {
    pub spec: SeparableConv2dSpec,
}

impl SeparableConv2d {
    pub fn new(filters: usize, kernel_size: (usize, usize)) -> Self {
        Self {
            spec: SeparableConv2dSpec::new(filters, kernel_size),
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.spec.padding = padding;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.spec.use_bias = bias;
        self
    }
}

impl Layer for SeparableConv2d {
    fn kind(&self) -> LayerKind {
        LayerKind::SeparableConv2d(self.spec)
    }
}

impl Module for SeparableConv2d {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

/// Convolution with an input-dependent kernel mixed from several experts.
///
/// [`ExpertConv2d::dynamic`] routes with a softmax over kernels,
/// [`ExpertConv2d::conditional`] with independent sigmoid gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpertConv2d {
    pub spec: ExpertConv2dSpec,
}

impl ExpertConv2d {
    pub fn dynamic(filters: usize, kernel_size: (usize, usize), num_kernels: usize) -> Self {
        Self::new(filters, kernel_size, num_kernels, Activation::Softmax)
    }

    pub fn conditional(filters: usize, kernel_size: (usize, usize), num_experts: usize) -> Self {
        Self::new(filters, kernel_size, num_experts, Activation::Sigmoid)
    }

    pub fn new(
        filters: usize,
        kernel_size: (usize, usize),
        num_experts: usize,
        routing: Activation,
    ) -> Self {
        Self {
            spec: ExpertConv2dSpec {
                conv: Conv2dSpec::new(filters, kernel_size),
                num_experts,
                routing,
            },
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.spec.conv.padding = padding;
        self
    }
}

impl Layer for ExpertConv2d {
    fn kind(&self) -> LayerKind {
        LayerKind::ExpertConv2d(self.spec)
    }
}

impl Module for ExpertConv2d {
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
    fn test_conv2d_creation() {
        let conv = Conv2d::new(64, (3, 3))
            .with_padding(Padding::Same)
            .with_stride((1, 1));

        assert_eq!(conv.spec.filters, 64);
        assert_eq!(conv.spec.kernel_size, (3, 3));
        assert_eq!(conv.spec.padding, Padding::Same);
        assert!(conv.spec.use_bias);
    }

    #[test]
    fn test_conv2d_forward() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![32, 32, 3]);
        let conv = Conv2d::new(64, (3, 3)).with_stride((2, 2));

        let output = conv.forward(&input).unwrap();

        assert_eq!(output.shape().unwrap(), vec![15, 15, 64]);
        assert_eq!(context.borrow().main_graph().nodes.len(), 2);
    }

    #[test]
    fn test_separable_conv2d_same_padding() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![29, 1, 16]);
        let conv = SeparableConv2d::new(32, (3, 3)).with_padding(Padding::Same).with_bias(false);

        let output = conv.forward(&input).unwrap();
        assert_eq!(output.shape().unwrap(), vec![29, 1, 32]);
    }

    #[test]
    fn test_expert_conv_routing() {
        assert_eq!(ExpertConv2d::dynamic(8, (3, 3), 4).spec.routing, Activation::Softmax);
        assert_eq!(ExpertConv2d::conditional(8, (3, 3), 8).spec.num_experts, 8);
    }
}
