//! # Neural Network Layers Module
//!
//! Building blocks for the layer graph. Each layer adds one node (or, for
//! composite modules, a fixed pattern of nodes) to the graph of its input
//! tensor. The output shape of every node is inferred as it is added, so a
//! layer applied to an incompatible input fails immediately.
//!
//! ## Available Layers
//!
//! ### Convolution
//! - [`Conv2d`]: 2D convolution with stride, padding, groups
//! - [`SeparableConv2d`]: depthwise-separable convolution
//! - [`ExpertConv2d`]: dynamic (softmax-routed) and conditional (sigmoid-routed) convolution
//!
//! ### Dense & Recurrent
//! - [`Dense`]: fully connected layer over the last axis
//! - [`Gru`], [`Bidirectional`]: recurrent layers
//!
//! ### Normalization
//! - [`BatchNorm`], [`LayerNorm`]
//!
//! ### Attention & Transformers
//! - [`MultiHeadAttention`]: multi-head self attention
//! - [`FeedForward`]: position-wise feed-forward network
//! - [`TransformerEncoderLayer`]: post-norm encoder layer
//!
//! ### Pooling, activations, regularization, wrappers
//! - [`MaxPool2d`], [`AvgPool2d`]
//! - [`Activation`]
//! - [`Dropout`]
//! - [`TimeDistributed`]
//!
//! ## Example
//!
//! ```ignore
//! use rustycx::nn::{Activation, BatchNorm, Conv2d, Module};
//! use rustycx::tensor::{GraphContext, Tensor};
//!
//! let ctx = Rc::new(RefCell::new(GraphContext::new()));
//! let x = Tensor::new_input(&ctx, "input", vec![64, 64, 3]);
//! let h = Conv2d::new(16, (3, 3)).forward(&x)?;
//! let h = Activation::Relu.forward(&BatchNorm::new().forward(&h)?)?;
//! ```

pub mod activations;
pub mod attention;
pub mod batchnorm;
pub mod conv;
pub mod dropout;
pub mod feedforward;
pub mod linear;
pub mod module;
pub mod norm;
pub mod pooling;
pub mod recurrent;
pub mod transformer;
pub mod wrappers;

pub use activations::Activation;
pub use attention::MultiHeadAttention;
pub use batchnorm::BatchNorm;
pub use conv::{Conv2d, ExpertConv2d, SeparableConv2d};
pub use dropout::Dropout;
pub use feedforward::FeedForward;
pub use linear::Dense;
pub use module::{Layer, Module};
pub use norm::LayerNorm;
pub use pooling::{AvgPool2d, MaxPool2d};
pub use recurrent::{Bidirectional, Gru};
pub use transformer::TransformerEncoderLayer;
pub use wrappers::TimeDistributed;
