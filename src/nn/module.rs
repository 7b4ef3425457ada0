//! Module defining the core `Module` and `Layer` traits for all network layers.

use crate::graph::{GraphResult, LayerKind};
use crate::tensor::Tensor;

/// Trait defining the common interface for all layers and composite modules.
///
/// A `Module` adds a specific pattern of layer nodes to the graph of its input.
pub trait Module {
    /// Performs a symbolic forward pass, building the corresponding part of the graph.
    ///
    /// Fails when the input shape violates the layer's shape contract.
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor>;
}

/// A module that maps to exactly one graph node.
///
/// Wrappers such as [`TimeDistributed`](super::TimeDistributed) need the node
/// description rather than a forward pass.
pub trait Layer {
    fn kind(&self) -> LayerKind;
}
