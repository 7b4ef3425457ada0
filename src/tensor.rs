//! Module defining the symbolic `Tensor` and `GraphContext`.
//!
//! A `Tensor` holds no data. It is a lightweight handle to a node in the
//! layer [`Graph`], plus a shared reference to the `GraphContext` that owns
//! the graph. Every operation on a tensor appends a node and returns a handle
//! to it; the node's output shape is known as soon as it is added.

use crate::complexity::{MergeOp, Shape};
use crate::graph::{Graph, GraphResult, LayerKind, NodeId};
use std::cell::RefCell;
use std::ops::{Add, Mul};
use std::rc::Rc;

/// Owns the graph being built by one trace.
///
/// Wrapped in `Rc<RefCell<>>` so that many `Tensor` handles can share it.
#[derive(Debug, Clone, Default)]
pub struct GraphContext {
    main_graph: Graph,
}

impl GraphContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main_graph_mut(&mut self) -> &mut Graph {
        &mut self.main_graph
    }

    pub fn main_graph(&self) -> &Graph {
        &self.main_graph
    }
}

/// Symbolic handle to a node of the layer graph.
#[derive(Debug, Clone)]
pub struct Tensor {
    /// ID of the node this tensor represents.
    pub node_id: NodeId,
    /// Shared reference to the context the graph is built in.
    pub context: Rc<RefCell<GraphContext>>,
}

impl Tensor {
    /// Creates a graph input of the given shape (batch excluded).
    pub fn new_input(context: &Rc<RefCell<GraphContext>>, name: &str, shape: Shape) -> Self {
        let node_id = context.borrow_mut().main_graph_mut().add_input(name, shape);
        Self {
            node_id,
            context: Rc::clone(context),
        }
    }

    /// Output shape of the node behind this handle.
    pub fn shape(&self) -> GraphResult<Shape> {
        let ctx = self.context.borrow();
        let node = ctx.main_graph().get_node(self.node_id)?;
        Ok(node.shape.clone())
    }

    /// Size of the last (channel) axis.
    pub fn channels(&self) -> GraphResult<usize> {
        let shape = self.shape()?;
        Ok(shape.last().copied().unwrap_or(0))
    }

    /// Appends a single-input layer fed by this tensor.
    pub fn apply(&self, kind: LayerKind) -> GraphResult<Tensor> {
        self.apply_named(None, kind)
    }

    pub fn apply_named(&self, name: Option<&str>, kind: LayerKind) -> GraphResult<Tensor> {
        Self::combine(&[self], name, kind)
    }

    fn combine(inputs: &[&Tensor], name: Option<&str>, kind: LayerKind) -> GraphResult<Tensor> {
        let context = Rc::clone(&inputs[0].context);
        let node_ids = inputs.iter().map(|t| t.node_id).collect();
        let node_id = context.borrow_mut().main_graph_mut().add_node(
            name.map(str::to_string),
            kind,
            node_ids,
        )?;
        Ok(Tensor { node_id, context })
    }

    // --- Shape transformations ---

    /// Reshape with at most one `-1` dimension.
    pub fn reshape(&self, shape: Vec<i64>) -> GraphResult<Tensor> {
        self.apply(LayerKind::Reshape(shape))
    }

    pub fn permute(&self, perm: Vec<usize>) -> GraphResult<Tensor> {
        self.apply(LayerKind::Permute(perm))
    }

    /// Appends a trailing axis of size 1.
    pub fn expand_dims(&self) -> GraphResult<Tensor> {
        let mut target: Vec<i64> = self.shape()?.iter().map(|&d| d as i64).collect();
        target.push(1);
        self.reshape(target)
    }

    /// Concatenates `other` after `self` along the channel axis.
    pub fn concat(&self, other: &Tensor) -> GraphResult<Tensor> {
        Self::combine(&[self, other], None, LayerKind::Merge(MergeOp::Concat))
    }
}

// Operators for the `a + b` syntax. Shapes are checked when the node is
// added, so the result is fallible.

impl Add<&Tensor> for &Tensor {
    type Output = GraphResult<Tensor>;
    fn add(self, rhs: &Tensor) -> Self::Output {
        Tensor::combine(&[self, rhs], None, LayerKind::Merge(MergeOp::Add))
    }
}

impl Mul<&Tensor> for &Tensor {
    type Output = GraphResult<Tensor>;
    fn mul(self, rhs: &Tensor) -> Self::Output {
        Tensor::combine(&[self, rhs], None, LayerKind::Merge(MergeOp::Multiply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;

    fn context() -> Rc<RefCell<GraphContext>> {
        Rc::new(RefCell::new(GraphContext::new()))
    }

    #[test]
    fn test_input_shape_is_recorded() {
        let ctx = context();
        let x = Tensor::new_input(&ctx, "x", vec![10, 4, 2]);
        assert_eq!(x.shape().unwrap(), vec![10, 4, 2]);
        assert_eq!(x.channels().unwrap(), 2);
        assert_eq!(ctx.borrow().main_graph().inputs, vec![x.node_id]);
    }

    #[test]
    fn test_operators_add_merge_nodes() {
        let ctx = context();
        let x = Tensor::new_input(&ctx, "x", vec![4, 8]);
        let y = (&x + &x).unwrap();
        let z = (&y * &x).unwrap();
        assert_eq!(z.shape().unwrap(), vec![4, 8]);
        assert_eq!(ctx.borrow().main_graph().nodes.len(), 3);
    }

    #[test]
    fn test_add_rejects_mismatched_shapes() {
        let ctx = context();
        let x = Tensor::new_input(&ctx, "x", vec![4, 8]);
        let y = Tensor::new_input(&ctx, "y", vec![4, 6]);
        assert!(matches!(&x + &y, Err(GraphError::Shape(_))));
    }

    #[test]
    fn test_expand_dims_and_concat() {
        let ctx = context();
        let x = Tensor::new_input(&ctx, "x", vec![5, 6, 3]);
        assert_eq!(x.expand_dims().unwrap().shape().unwrap(), vec![5, 6, 3, 1]);
        let joined = x.concat(&x).unwrap();
        assert_eq!(joined.shape().unwrap(), vec![5, 6, 6]);
    }
}
