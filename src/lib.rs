//! # RustyCX: analytical complexity of neural-network blocks
//!
//! **RustyCX** pairs a catalog of parametrized neural-network blocks
//! (convolutional stages, residual stages, recurrent stacks, Transformer
//! encoders, a time-distributed Xception extractor) with a catalog that
//! computes their cost (multiply-accumulates, parameter counts) and output
//! shape without running anything.
//!
//! Blocks are built on a symbolic layer graph. Every layer is one
//! [`graph::LayerKind`], which knows its own shape rule and cost formula, so
//! a block and its complexity are always derived from the same description.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rustycx::catalog::complexity_by_name;
//! use serde_json::json;
//!
//! let config = json!({
//!     "depth": 3,
//!     "filters": 64,
//!     "strides": 2,
//!     "groups": 4,
//!     "bottleneck_ratio": 0.25,
//! });
//! let (cx, shape) = complexity_by_name("res_bottleneck_stage", &config, &[56, 56, 32])?;
//! println!("{} MACs, {} params, output {:?}", cx.flops(), cx.params(), shape);
//! # Ok::<(), rustycx::Error>(())
//! ```

pub mod analysis;
pub mod blocks;
pub mod catalog;
pub mod complexity;
pub mod config;
pub mod cost;
pub mod error;
pub mod graph;
pub mod nn;
pub mod stages;
pub mod tensor;

pub use cost::{dict_add, Complexity};
pub use error::{Error, Result};
