//! Layer graph: the declarative description every block is built from.
//!
//! Each [`Node`] stores a [`LayerKind`] and the output shape inferred when
//! the node was added. [`LayerKind::infer`] is the only place where a layer's
//! shape rule and cost formula meet, so building a block and measuring its
//! cost can never drift apart.

use crate::complexity::{
    self, AttentionSpec, Conv2dSpec, ExpertConv2dSpec, MergeMode, MergeOp, Pool2dSpec,
    SeparableConv2dSpec, Shape, ShapeError,
};
use crate::cost::Complexity;
use crate::nn::Activation;
use std::collections::HashMap;
use thiserror::Error;

/// Node identifier.
pub type NodeId = usize;

pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node with ID {0} not found")]
    NodeNotFound(NodeId),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("'{layer}' expects {expected} input channels, got {actual}")]
    ChannelMismatch {
        layer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Shape information missing for node {0}. The graph may contain a cycle.")]
    MissingShapeInfo(NodeId),

    #[error("Initial shape not specified for input '{0}'")]
    MissingInitialShape(String),

    #[error("Node {node} was recorded with shape {recorded:?} but re-inferred as {inferred:?}")]
    ShapeMismatch {
        node: NodeId,
        recorded: Shape,
        inferred: Shape,
    },

    #[error("Graph has no outputs")]
    NoOutputs,
}

/// A single layer, described only by its hyper-parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Input { name: String },

    Conv2d(Conv2dSpec),
    SeparableConv2d(SeparableConv2dSpec),
    ExpertConv2d(ExpertConv2dSpec),
    Dense { units: usize, use_bias: bool },
    Gru { units: usize },
    Bidirectional { units: usize, merge: MergeMode },
    MultiHeadAttention(AttentionSpec),

    BatchNorm,
    LayerNorm,

    MaxPool2d(Pool2dSpec),
    AvgPool2d(Pool2dSpec),

    Activation(Activation),
    Dropout { rate: f32 },

    Reshape(Vec<i64>),
    Permute(Vec<usize>),
    Merge(MergeOp),

    /// Applies the wrapped layer to every slice along axis 0.
    TimeDistributed(Box<LayerKind>),
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Input { .. } => "input",
            LayerKind::Conv2d(_) => "conv2d",
            LayerKind::SeparableConv2d(_) => "separable_conv2d",
            LayerKind::ExpertConv2d(_) => "expert_conv2d",
            LayerKind::Dense { .. } => "dense",
            LayerKind::Gru { .. } => "gru",
            LayerKind::Bidirectional { .. } => "bidirectional",
            LayerKind::MultiHeadAttention(_) => "multi_head_attention",
            LayerKind::BatchNorm => "batch_norm",
            LayerKind::LayerNorm => "layer_norm",
            LayerKind::MaxPool2d(_) => "max_pool2d",
            LayerKind::AvgPool2d(_) => "avg_pool2d",
            LayerKind::Activation(_) => "activation",
            LayerKind::Dropout { .. } => "dropout",
            LayerKind::Reshape(_) => "reshape",
            LayerKind::Permute(_) => "permute",
            LayerKind::Merge(_) => "merge",
            LayerKind::TimeDistributed(_) => "time_distributed",
        }
    }

    /// Cost and output shape of this layer for the given input shapes.
    pub fn infer(&self, inputs: &[&[usize]]) -> complexity::Result<(Complexity, Shape)> {
        match self {
            LayerKind::Input { name } => Err(ShapeError::UnboundInput(name.clone())),
            LayerKind::Merge(op) => complexity::merge_complexity(inputs, *op, None),
            single => match inputs {
                [shape] => single.infer_single(shape),
                _ => Err(ShapeError::Arity {
                    layer: single.name(),
                    expected: 1,
                    actual: inputs.len(),
                }),
            },
        }
    }

    fn infer_single(&self, shape: &[usize]) -> complexity::Result<(Complexity, Shape)> {
        match self {
            LayerKind::Conv2d(spec) => complexity::conv2d_complexity(shape, spec, None),
            LayerKind::SeparableConv2d(spec) => {
                complexity::separable_conv2d_complexity(shape, spec, None)
            }
            LayerKind::ExpertConv2d(spec) => complexity::expert_conv2d_complexity(shape, spec, None),
            LayerKind::Dense { units, use_bias } => {
                complexity::dense_complexity(shape, *units, *use_bias, None)
            }
            LayerKind::Gru { units } => complexity::gru_complexity(shape, *units, None),
            LayerKind::Bidirectional { units, merge } => {
                complexity::bidirectional_complexity(shape, *units, *merge, None)
            }
            LayerKind::MultiHeadAttention(spec) => complexity::attention_complexity(shape, spec, None),
            LayerKind::BatchNorm => complexity::norm_complexity(shape, None),
            LayerKind::LayerNorm => complexity::layer_norm_complexity(shape, None),
            LayerKind::MaxPool2d(spec) | LayerKind::AvgPool2d(spec) => {
                complexity::pool2d_complexity(shape, spec, None)
            }
            LayerKind::Activation(_) | LayerKind::Dropout { .. } => {
                Ok((Complexity::new(), shape.to_vec()))
            }
            LayerKind::Reshape(target) => complexity::reshape_complexity(shape, target, None),
            LayerKind::Permute(perm) => complexity::permute_complexity(shape, perm, None),
            LayerKind::TimeDistributed(inner) => {
                complexity::time_distributed_complexity(shape, |slice| inner.infer(&[slice]), None)
            }
            LayerKind::Input { .. } | LayerKind::Merge(_) => self.infer(&[shape]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node ID (duplicates the map key for convenience).
    pub id: NodeId,
    pub name: Option<String>,
    pub kind: LayerKind,
    pub inputs: Vec<NodeId>,
    /// Output shape inferred when the node was added.
    pub shape: Shape,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: HashMap<NodeId, Node>,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a graph input with a known shape.
    pub fn add_input(&mut self, name: &str, shape: Shape) -> NodeId {
        let id = self.nodes.len();
        let node = Node {
            id,
            name: Some(name.to_string()),
            kind: LayerKind::Input { name: name.to_string() },
            inputs: vec![],
            shape,
        };
        self.nodes.insert(id, node);
        self.inputs.push(id);
        id
    }

    /// Adds a layer fed by `inputs`, inferring its output shape immediately.
    pub fn add_node(
        &mut self,
        name: Option<String>,
        kind: LayerKind,
        inputs: Vec<NodeId>,
    ) -> GraphResult<NodeId> {
        let input_shapes = inputs
            .iter()
            .map(|&id| self.get_node(id).map(|node| node.shape.as_slice()))
            .collect::<GraphResult<Vec<_>>>()?;
        let (_, shape) = kind.infer(&input_shapes)?;

        let id = self.nodes.len();
        self.nodes.insert(id, Node { id, name, kind, inputs, shape });
        Ok(id)
    }

    pub fn set_outputs(&mut self, outputs: Vec<NodeId>) {
        self.outputs = outputs;
    }

    pub fn set_output(&mut self, output: NodeId) {
        self.set_outputs(vec![output]);
    }

    pub fn get_node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }
}
