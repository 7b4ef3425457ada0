//! Time-distributed Xception feature extractor.
//!
//! A 2D stem runs over the whole `[T, F, C]` input, then the per-step feature
//! maps are treated as small images and every later convolution is wrapped in
//! [`TimeDistributed`]. Normalization and activations act on the channel axis
//! and need no wrapping.

use crate::blocks::BlockFn;
use crate::complexity::{Padding, ShapeError};
use crate::config::{check_positive, BlockConfig, ConfigResult};
use crate::error::Result;
use crate::graph::GraphResult;
use crate::nn::{
    Activation, BatchNorm, Conv2d, MaxPool2d, Module, SeparableConv2d, TimeDistributed,
};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XceptionBlockConfig {
    /// Base width; every flow is a multiple of it.
    pub filters: usize,
    /// Number of middle-flow blocks.
    pub block_num: usize,
}

impl XceptionBlockConfig {
    /// Middle-flow width, `floor(filters * 22.75)`.
    pub fn middle_filters(&self) -> usize {
        self.filters * 91 / 4
    }
}

impl BlockConfig for XceptionBlockConfig {
    const NAME: &'static str = "timedistributed_xception_block";
    const REQUIRED: &'static [&'static str] = &["filters", "block_num"];

    fn validate(&self, block: &'static str) -> ConfigResult<()> {
        check_positive(block, "filters", self.filters)
    }
}

/// TD separable 3x3 conv -> BN -> optional activation.
fn sepconv(x: &Tensor, filters: usize, activation: Option<Activation>) -> GraphResult<Tensor> {
    let conv = SeparableConv2d::new(filters, (3, 3))
        .with_padding(Padding::Same)
        .with_bias(false);
    let x = TimeDistributed::new(&conv).forward(x)?;
    let x = BatchNorm::new().forward(&x)?;
    match activation {
        Some(act) => act.forward(&x),
        None => Ok(x),
    }
}

/// Two separable convs and a strided pooling, added to a strided 1x1 projection.
fn residual(x: &Tensor, filters1: usize, filters2: usize) -> GraphResult<Tensor> {
    let projection = Conv2d::new(filters2, (1, 1))
        .with_stride((2, 2))
        .with_padding(Padding::Same)
        .with_bias(false);
    let shortcut = TimeDistributed::new(&projection).forward(x)?;
    let shortcut = BatchNorm::new().forward(&shortcut)?;

    let out = sepconv(x, filters1, Some(Activation::Relu))?;
    let out = sepconv(&out, filters2, None)?;
    let pool = MaxPool2d::new((3, 3))
        .with_strides((2, 2))
        .with_padding(Padding::Same);
    let out = TimeDistributed::new(&pool).forward(&out)?;
    &out + &shortcut
}

fn conv_bn_relu(x: &Tensor, conv: Conv2d) -> GraphResult<Tensor> {
    let x = TimeDistributed::new(&conv).forward(x)?;
    let x = BatchNorm::new().forward(&x)?;
    Activation::Relu.forward(&x)
}

/// Output is `[T / 5, H, W * C]` of the final feature maps.
pub fn timedistributed_xception_block(config: &XceptionBlockConfig) -> Result<BlockFn> {
    config.validate(XceptionBlockConfig::NAME)?;
    let filters = config.filters;
    let block_num = config.block_num;
    let mid = config.middle_filters();

    Ok(Box::new(move |inputs: &Tensor| {
        let stem = Conv2d::new(filters, (3, 3))
            .with_padding(Padding::Same)
            .with_bias(false);
        let x = stem.forward(inputs)?;
        let x = BatchNorm::new().forward(&x)?;
        let x = Activation::Relu.forward(&x)?;
        let x = MaxPool2d::new((5, 1)).forward(&x)?;
        let x = x.expand_dims()?;

        // entry flow
        let x = conv_bn_relu(&x, Conv2d::new(filters, (3, 3)).with_stride((2, 2)).with_bias(false))?;
        let x = conv_bn_relu(&x, Conv2d::new(filters * 2, (3, 3)).with_bias(false))?;
        let x = residual(&x, filters * 4, filters * 4)?;
        let x = residual(&x, filters * 8, filters * 8)?;
        let mut x = residual(&x, mid, mid)?;

        // middle flow
        for _ in 0..block_num {
            let mut out = x.clone();
            for _ in 0..3 {
                out = Activation::Relu.forward(&out)?;
                out = sepconv(&out, mid, None)?;
            }
            x = (&out + &x)?;
        }

        // exit flow
        let x = residual(&x, mid, filters * 32)?;
        let x = sepconv(&x, filters * 48, Some(Activation::Relu))?;
        let x = sepconv(&x, filters * 64, Some(Activation::Relu))?;
        flatten_feature_maps(&x)
    }))
}

/// `[T, H, W, C]` -> `[T, H, W * C]`.
fn flatten_feature_maps(x: &Tensor) -> GraphResult<Tensor> {
    let shape = x.shape()?;
    match shape[..] {
        [steps, height, width, channels] => {
            x.reshape(vec![steps as i64, height as i64, (width * channels) as i64])
        }
        _ => Err(ShapeError::InvalidRank {
            layer: "timedistributed_xception_block",
            expected: 4,
            shape: shape.clone(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;
    use crate::tensor::GraphContext;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn input(shape: Vec<usize>) -> Tensor {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        Tensor::new_input(&context, "input", shape)
    }

    #[test]
    fn test_middle_filters_floor() {
        let config = XceptionBlockConfig { filters: 8, block_num: 1 };
        assert_eq!(config.middle_filters(), 182);
        let config = XceptionBlockConfig { filters: 3, block_num: 1 };
        assert_eq!(config.middle_filters(), 68);
    }

    #[test]
    fn test_xception_output_shape() {
        let block = timedistributed_xception_block(&XceptionBlockConfig {
            filters: 8,
            block_num: 1,
        })
        .unwrap();
        let y = block(&input(vec![100, 64, 4])).unwrap();
        assert_eq!(y.shape().unwrap(), vec![20, 2, 512]);
    }

    #[test]
    fn test_flatten_feature_maps_requires_rank_four() {
        let y = flatten_feature_maps(&input(vec![20, 2, 8, 64])).unwrap();
        assert_eq!(y.shape().unwrap(), vec![20, 2, 512]);

        assert_eq!(
            flatten_feature_maps(&input(vec![20, 2, 512])).unwrap_err(),
            GraphError::Shape(ShapeError::InvalidRank {
                layer: "timedistributed_xception_block",
                expected: 4,
                shape: vec![20, 2, 512],
            })
        );
    }

    #[test]
    fn test_xception_rejects_narrow_inputs() {
        let block = timedistributed_xception_block(&XceptionBlockConfig {
            filters: 2,
            block_num: 0,
        })
        .unwrap();
        assert!(matches!(
            block(&input(vec![100, 64, 4])),
            Err(GraphError::Shape(ShapeError::WindowTooLarge { .. }))
        ));
    }
}
