//! Module implementing Multi-Head self-attention for the layer graph.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use rustycx::nn::{MultiHeadAttention, Module};
//! use rustycx::tensor::{GraphContext, Tensor};
//!
//! let context = Rc::new(RefCell::new(GraphContext::new()));
//! let mha = MultiHeadAttention::new(8, 64);
//!
//! let input = Tensor::new_input(&context, "input", vec![100, 512]);
//! let output = mha.forward(&input)?; // [100, 512]
//! ```

use crate::complexity::{AttentionAxes, AttentionSpec};
use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// Multi-Head self-attention.
///
/// The output projection maps back to the input width, so the layer is
/// shape-preserving. By default every non-feature axis takes part in one
/// joint attention; see [`AttentionAxes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiHeadAttention {
    pub spec: AttentionSpec,
}

impl MultiHeadAttention {
    /// Creates attention with `num_heads` heads of width `key_dim` and biased projections.
    pub fn new(num_heads: usize, key_dim: usize) -> Self {
        Self {
            spec: AttentionSpec {
                num_heads,
                key_dim,
                use_bias: true,
                axes: AttentionAxes::Joint,
            },
        }
    }

    pub fn with_axes(mut self, axes: AttentionAxes) -> Self {
        self.spec.axes = axes;
        self
    }
}

impl Layer for MultiHeadAttention {
    fn kind(&self) -> LayerKind {
        LayerKind::MultiHeadAttention(self.spec)
    }
}

impl Module for MultiHeadAttention {
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
    fn test_attention_preserves_shape() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![4, 5, 8]);
        let output = MultiHeadAttention::new(2, 4).forward(&input).unwrap();
        assert_eq!(output.shape().unwrap(), vec![4, 5, 8]);
    }

    #[test]
    fn test_attention_axes_change_cost_not_shape() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![4, 5, 8]);
        let joint = MultiHeadAttention::new(2, 4).forward(&input).unwrap();
        let split = MultiHeadAttention::new(2, 4)
            .with_axes(AttentionAxes::Sequence)
            .forward(&input)
            .unwrap();
        assert_eq!(joint.shape().unwrap(), split.shape().unwrap());

        let ctx = context.borrow();
        let graph = ctx.main_graph();
        let flops = |t: &Tensor| {
            let node = graph.get_node(t.node_id).unwrap();
            node.kind.infer(&[&[4, 5, 8]]).unwrap().0.flops()
        };
        assert!(flops(&joint) > flops(&split));
    }

    #[test]
    fn test_attention_rejects_rank_one() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![8]);
        assert!(MultiHeadAttention::new(2, 4).forward(&input).is_err());
    }
}
