//! # Graph Analysis Module
//!
//! Passes that process a traced layer graph.
//!
//! ## Available Passes
//!
//! - [`CostInference`]: re-infers every node's shape and sums the per-layer
//!   costs, checking the result against the shapes recorded while building.
//!
//! ## How It Works
//!
//! ```text
//! block closure -> trace (graph with recorded shapes) -> CostInference -> (Complexity, Shape)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use rustycx::analysis::trace;
//!
//! let block = simple_conv_block(&config)?;
//! let (cx, shape) = trace(&block, &[64, 64, 3])?;
//! ```

pub mod cost_inference;

pub use cost_inference::CostInference;

use crate::complexity::Shape;
use crate::cost::Complexity;
use crate::graph::{GraphError, GraphResult};
use crate::tensor::{GraphContext, Tensor};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Name of the single input node created by [`trace`].
pub const TRACE_INPUT: &str = "input";

/// Applies `block` to a fresh symbolic input of `input_shape` and measures
/// the resulting graph.
pub fn trace<F>(block: &F, input_shape: &[usize]) -> GraphResult<(Complexity, Shape)>
where
    F: Fn(&Tensor) -> GraphResult<Tensor> + ?Sized,
{
    let context = Rc::new(RefCell::new(GraphContext::new()));
    let input = Tensor::new_input(&context, TRACE_INPUT, input_shape.to_vec());
    let output = block(&input)?;
    context.borrow_mut().main_graph_mut().set_output(output.node_id);

    let initial_shapes = HashMap::from([(TRACE_INPUT.to_string(), input_shape.to_vec())]);
    let ctx = context.borrow();
    let (cx, mut outputs) = CostInference::run(ctx.main_graph(), &initial_shapes)?;
    let shape = outputs.pop().ok_or(GraphError::NoOutputs)?;
    Ok((cx, shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{BatchNorm, Dense, Module};

    #[test]
    fn test_trace_identity_block_is_free() {
        let identity = |x: &Tensor| -> GraphResult<Tensor> { Ok(x.clone()) };
        let (cx, shape) = trace(&identity, &[4, 4]).unwrap();
        assert!(cx.is_empty());
        assert_eq!(shape, vec![4, 4]);
    }

    #[test]
    fn test_trace_closure() {
        let block = |x: &Tensor| {
            let h = Dense::new(16).forward(x)?;
            BatchNorm::new().forward(&h)
        };
        let (cx, shape) = trace(&block, &[10, 32]).unwrap();
        assert_eq!(shape, vec![10, 16]);
        assert_eq!(cx.params(), 528 + 64);
        assert_eq!(cx.flops(), 5120 + 160);
    }

    #[test]
    fn test_trace_propagates_block_errors() {
        let block = |x: &Tensor| Dense::new(4).forward(x);
        assert!(trace(&block, &[]).is_err());
    }
}
