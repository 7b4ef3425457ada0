//! # Block Catalog
//!
//! One constructor per architecture pattern. A constructor validates its
//! configuration and returns a [`BlockFn`] that appends the block's layers to
//! the graph of whatever symbolic tensor it is applied to.
//!
//! ```ignore
//! use rustycx::blocks::res_bottleneck_stage;
//!
//! let stage = res_bottleneck_stage(&config)?;
//! let y = stage(&x)?;
//! ```
//!
//! The matching cost functions live in [`crate::stages`].

pub mod conv;
pub mod dense;
pub mod dense_net;
pub mod residual;
pub mod sequential;
pub mod xception;

pub use conv::{
    another_conv_block, another_conv_stage, cond_conv_block, dynamic_conv_block,
    simple_conv_block, simple_conv_stage, CondConvBlockConfig, ConvBlockConfig,
    DynamicConvBlockConfig, SimpleConvStageConfig,
};
pub use dense::{simple_dense_block, SimpleDenseBlockConfig};
pub use dense_net::{dense_net_block, dense_net_stage, DenseNetBlockConfig};
pub use residual::{
    res_basic_block, res_basic_stage, res_bottleneck_block, res_bottleneck_stage,
    ResBasicBlockConfig, ResBasicStageConfig, ResBottleneckBlockConfig, ResBottleneckStageConfig,
};
pub use sequential::{
    bidirectional_gru_block, sepformer_block, sepformer_stage, transformer_encoder_layer,
    BidirectionalGruBlockConfig, SepformerBlockConfig, SepformerStageConfig,
    TransformerEncoderLayerConfig,
};
pub use xception::{timedistributed_xception_block, XceptionBlockConfig};

use crate::graph::GraphResult;
use crate::tensor::Tensor;

/// A built block: maps an input tensor to the block's output tensor.
pub type BlockFn = Box<dyn Fn(&Tensor) -> GraphResult<Tensor>>;
