//! Primitive complexity functions.
//!
//! Each function takes an input shape (batch excluded, channel last), the
//! layer's parameters and an optional previous record, and returns the
//! accumulated [`Complexity`] together with the layer's output shape.
//!
//! `flops` counts multiply-accumulate operations. Layers without weights
//! (pooling, activations, dropout, merges, reshapes) only move shapes.
//!
//! Counts are `u64`. Convolution kernels are sized with checked arithmetic
//! and fail with [`ShapeError::Overflow`]; the other layers assume their
//! per-layer counts fit, and accumulated totals saturate.

use crate::cost::{Complexity, PARAMS};
use crate::nn::Activation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tensor shape without the batch dimension, channel last.
pub type Shape = Vec<usize>;

pub type Result<T> = std::result::Result<T, ShapeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("'{layer}' expects a rank-{expected} input (channel last), got {shape:?}")]
    InvalidRank {
        layer: &'static str,
        expected: usize,
        shape: Shape,
    },

    #[error("'{layer}' expects at least a rank-{min} input, got {shape:?}")]
    RankTooLow {
        layer: &'static str,
        min: usize,
        shape: Shape,
    },

    #[error("'{layer}': window {window} does not fit dimension {dim} with 'valid' padding")]
    WindowTooLarge {
        layer: &'static str,
        window: usize,
        dim: usize,
    },

    #[error("'{layer}': {channels} channels cannot be split into {groups} groups")]
    GroupMismatch {
        layer: &'static str,
        channels: usize,
        groups: usize,
    },

    #[error("'{layer}': cost does not fit in 64 bits")]
    Overflow { layer: &'static str },

    #[error("'{layer}': {what} must be non-zero")]
    ZeroSize {
        layer: &'static str,
        what: &'static str,
    },

    #[error("Incompatible shapes for '{op}': {left:?} and {right:?}")]
    IncompatibleShapes {
        op: &'static str,
        left: Shape,
        right: Shape,
    },

    #[error("'{layer}' takes {expected} input(s), got {actual}")]
    Arity {
        layer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot reshape {from:?} into {to:?}")]
    ReshapeMismatch { from: Shape, to: Vec<i64> },

    #[error("Invalid permutation {perm:?} for shape {shape:?}")]
    InvalidPermutation { perm: Vec<usize>, shape: Shape },

    #[error("Input '{0}' has no shape bound to it")]
    UnboundInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    Same,
    #[default]
    Valid,
}

/// How a bidirectional wrapper combines its two directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Concat,
    #[default]
    Mul,
    Sum,
    Ave,
}

/// Element-wise or channel-wise combination of several tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOp {
    Add,
    Multiply,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dSpec {
    pub filters: usize,
    pub kernel_size: (usize, usize),
    pub strides: (usize, usize),
    pub padding: Padding,
    pub groups: usize,
    pub use_bias: bool,
}

impl Conv2dSpec {
    pub fn new(filters: usize, kernel_size: (usize, usize)) -> Self {
        Self {
            filters,
            kernel_size,
            strides: (1, 1),
            padding: Padding::Valid,
            groups: 1,
            use_bias: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparableConv2dSpec {
    pub filters: usize,
    pub kernel_size: (usize, usize),
    pub strides: (usize, usize),
    pub padding: Padding,
    pub depth_multiplier: usize,
    pub use_bias: bool,
}

impl SeparableConv2dSpec {
    pub fn new(filters: usize, kernel_size: (usize, usize)) -> Self {
        Self {
            filters,
            kernel_size,
            strides: (1, 1),
            padding: Padding::Valid,
            depth_multiplier: 1,
            use_bias: true,
        }
    }
}

/// Convolution whose kernel is a routed mixture of `num_experts` kernels.
/// The routing activation does not change the cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpertConv2dSpec {
    pub conv: Conv2dSpec,
    pub num_experts: usize,
    pub routing: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool2dSpec {
    pub pool_size: (usize, usize),
    /// Defaults to `pool_size` when `None`.
    pub strides: Option<(usize, usize)>,
    pub padding: Padding,
}

impl Pool2dSpec {
    pub fn new(pool_size: (usize, usize)) -> Self {
        Self {
            pool_size,
            strides: None,
            padding: Padding::Valid,
        }
    }
}

/// Axes self-attention runs over. Features are always the last axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttentionAxes {
    /// Every non-feature axis forms one sequence of their product's length.
    #[default]
    Joint,
    /// Axis -2 only. Leading axes are independent sequences.
    Sequence,
}

/// Self-attention with `num_heads` heads of width `key_dim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttentionSpec {
    pub num_heads: usize,
    pub key_dim: usize,
    pub use_bias: bool,
    pub axes: AttentionAxes,
}

fn accumulate(cx: Complexity, shape: Shape, prev_cx: Option<&Complexity>) -> (Complexity, Shape) {
    match prev_cx {
        Some(prev) => (prev.merge(&cx), shape),
        None => (cx, shape),
    }
}

fn image_dims(layer: &'static str, shape: &[usize]) -> Result<(usize, usize, usize)> {
    match *shape {
        [h, w, c] => {
            if h == 0 || w == 0 || c == 0 {
                return Err(ShapeError::ZeroSize { layer, what: "input dimension" });
            }
            Ok((h, w, c))
        }
        _ => Err(ShapeError::InvalidRank {
            layer,
            expected: 3,
            shape: shape.to_vec(),
        }),
    }
}

fn channels(layer: &'static str, shape: &[usize]) -> Result<usize> {
    match shape.last() {
        Some(&c) if c > 0 => Ok(c),
        Some(_) => Err(ShapeError::ZeroSize { layer, what: "channel dimension" }),
        None => Err(ShapeError::RankTooLow {
            layer,
            min: 1,
            shape: shape.to_vec(),
        }),
    }
}

/// Product of `factors`, or [`ShapeError::Overflow`].
fn checked_product(layer: &'static str, factors: &[usize]) -> Result<u64> {
    factors.iter().try_fold(1u64, |acc, &f| {
        acc.checked_mul(f as u64).ok_or(ShapeError::Overflow { layer })
    })
}

fn elements(shape: &[usize]) -> u64 {
    shape.iter().map(|&d| d as u64).product()
}

/// Output length of a sliding window along one axis.
fn window_out(
    layer: &'static str,
    dim: usize,
    window: usize,
    stride: usize,
    padding: Padding,
) -> Result<usize> {
    if window == 0 {
        return Err(ShapeError::ZeroSize { layer, what: "window" });
    }
    if stride == 0 {
        return Err(ShapeError::ZeroSize { layer, what: "stride" });
    }
    match padding {
        Padding::Same => Ok((dim + stride - 1) / stride),
        Padding::Valid if dim < window => Err(ShapeError::WindowTooLarge { layer, window, dim }),
        Padding::Valid => Ok((dim - window) / stride + 1),
    }
}

pub fn conv2d_complexity(
    input_shape: &[usize],
    spec: &Conv2dSpec,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    const LAYER: &str = "conv2d";
    let (h, w, c) = image_dims(LAYER, input_shape)?;
    if spec.filters == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "filters" });
    }
    if spec.groups == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "groups" });
    }
    for channels in [c, spec.filters] {
        if channels % spec.groups != 0 {
            return Err(ShapeError::GroupMismatch {
                layer: LAYER,
                channels,
                groups: spec.groups,
            });
        }
    }

    let (kh, kw) = spec.kernel_size;
    let out_h = window_out(LAYER, h, kh, spec.strides.0, spec.padding)?;
    let out_w = window_out(LAYER, w, kw, spec.strides.1, spec.padding)?;

    let kernel = checked_product(LAYER, &[kh, kw, c / spec.groups, spec.filters])?;
    let positions = checked_product(LAYER, &[out_h, out_w])?;
    let flops = positions
        .checked_mul(kernel)
        .ok_or(ShapeError::Overflow { layer: LAYER })?;
    let bias = if spec.use_bias { spec.filters as u64 } else { 0 };
    let cx = Complexity::with_cost(flops, kernel.saturating_add(bias));

    Ok(accumulate(cx, vec![out_h, out_w, spec.filters], prev_cx))
}

/// Depthwise convolution followed by a 1x1 pointwise convolution.
pub fn separable_conv2d_complexity(
    input_shape: &[usize],
    spec: &SeparableConv2dSpec,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    const LAYER: &str = "separable_conv2d";
    let (h, w, c) = image_dims(LAYER, input_shape)?;
    if spec.filters == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "filters" });
    }
    if spec.depth_multiplier == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "depth_multiplier" });
    }

    let (kh, kw) = spec.kernel_size;
    let out_h = window_out(LAYER, h, kh, spec.strides.0, spec.padding)?;
    let out_w = window_out(LAYER, w, kw, spec.strides.1, spec.padding)?;

    let depthwise = (kh * kw * c * spec.depth_multiplier) as u64;
    let pointwise = (c * spec.depth_multiplier * spec.filters) as u64;
    let bias = if spec.use_bias { spec.filters as u64 } else { 0 };
    let cx = Complexity::with_cost(
        (out_h * out_w) as u64 * (depthwise + pointwise),
        depthwise + pointwise + bias,
    );

    Ok(accumulate(cx, vec![out_h, out_w, spec.filters], prev_cx))
}

/// Mixture-of-experts convolution: a router (global average pool and a dense
/// layer with one output per expert) weights `num_experts` kernels, which are
/// aggregated into one kernel before the convolution runs.
pub fn expert_conv2d_complexity(
    input_shape: &[usize],
    spec: &ExpertConv2dSpec,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    if spec.num_experts == 0 {
        return Err(ShapeError::ZeroSize {
            layer: "expert_conv2d",
            what: "num_experts",
        });
    }
    let (conv_cx, shape) = conv2d_complexity(input_shape, &spec.conv, None)?;
    let c = channels("expert_conv2d", input_shape)? as u64;
    let experts = spec.num_experts as u64;
    let kernel_params = conv_cx.params();

    let routing_params = c * experts + experts;
    let cx = Complexity::with_cost(
        conv_cx.flops() + c * experts + experts * kernel_params,
        experts * kernel_params + routing_params,
    );

    Ok(accumulate(cx, shape, prev_cx))
}

/// Batch normalization: gamma, beta and the two moving statistics per channel.
pub fn norm_complexity(
    input_shape: &[usize],
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    let c = channels("batch_norm", input_shape)? as u64;
    let cx = Complexity::with_cost(elements(input_shape), 4 * c);
    Ok(accumulate(cx, input_shape.to_vec(), prev_cx))
}

/// Layer normalization over the channel axis: gamma and beta per channel.
pub fn layer_norm_complexity(
    input_shape: &[usize],
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    let c = channels("layer_norm", input_shape)? as u64;
    let cx = Complexity::with_cost(elements(input_shape), 2 * c);
    Ok(accumulate(cx, input_shape.to_vec(), prev_cx))
}

/// Max or average pooling. Stride falls back to the pool size.
pub fn pool2d_complexity(
    input_shape: &[usize],
    spec: &Pool2dSpec,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    const LAYER: &str = "pool2d";
    let (h, w, c) = image_dims(LAYER, input_shape)?;
    let (ph, pw) = spec.pool_size;
    let (sh, sw) = spec.strides.unwrap_or(spec.pool_size);
    let out_h = window_out(LAYER, h, ph, sh, spec.padding)?;
    let out_w = window_out(LAYER, w, pw, sw, spec.padding)?;
    Ok(accumulate(Complexity::new(), vec![out_h, out_w, c], prev_cx))
}

/// Dense projection of the last axis; leading axes are batched.
pub fn dense_complexity(
    input_shape: &[usize],
    units: usize,
    use_bias: bool,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    const LAYER: &str = "dense";
    let d = channels(LAYER, input_shape)?;
    if units == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "units" });
    }
    let lead = elements(&input_shape[..input_shape.len() - 1]);
    let weights = (d * units) as u64;
    let bias = if use_bias { units as u64 } else { 0 };
    let cx = Complexity::with_cost(lead * weights, weights + bias);

    let mut shape = input_shape.to_vec();
    if let Some(last) = shape.last_mut() {
        *last = units;
    }
    Ok(accumulate(cx, shape, prev_cx))
}

/// GRU over a `[time, features]` sequence returning every step. Counts the
/// three gates with separate input and recurrent biases.
pub fn gru_complexity(
    input_shape: &[usize],
    units: usize,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    const LAYER: &str = "gru";
    let (t, d) = match *input_shape {
        [t, d] if t > 0 && d > 0 => (t, d),
        [_, _] => return Err(ShapeError::ZeroSize { layer: LAYER, what: "input dimension" }),
        _ => {
            return Err(ShapeError::InvalidRank {
                layer: LAYER,
                expected: 2,
                shape: input_shape.to_vec(),
            })
        }
    };
    if units == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "units" });
    }
    let (d, u) = (d as u64, units as u64);
    let gate_macs = d * u + u * u;
    let cx = Complexity::with_cost(t as u64 * 3 * gate_macs, 3 * (gate_macs + 2 * u));
    Ok(accumulate(cx, vec![t, units], prev_cx))
}

/// Two GRUs running in opposite directions, merged by `merge`.
pub fn bidirectional_complexity(
    input_shape: &[usize],
    units: usize,
    merge: MergeMode,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    let (one_way, mut shape) = gru_complexity(input_shape, units, None)?;
    if merge == MergeMode::Concat {
        shape[1] = 2 * units;
    }
    Ok(accumulate(one_way.scaled(2), shape, prev_cx))
}

/// Multi-head self-attention. The cost splits into the query/key/value
/// projections, the score matrix, the weighted sum over values and the
/// output projection.
pub fn attention_complexity(
    input_shape: &[usize],
    spec: &AttentionSpec,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    const LAYER: &str = "multi_head_attention";
    let rank = input_shape.len();
    if rank < 2 {
        return Err(ShapeError::RankTooLow {
            layer: LAYER,
            min: 2,
            shape: input_shape.to_vec(),
        });
    }
    if spec.num_heads == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "num_heads" });
    }
    if spec.key_dim == 0 {
        return Err(ShapeError::ZeroSize { layer: LAYER, what: "key_dim" });
    }
    let d = channels(LAYER, input_shape)? as u64;
    let (lead, t) = match spec.axes {
        AttentionAxes::Joint => (1, elements(&input_shape[..rank - 1])),
        AttentionAxes::Sequence => (
            elements(&input_shape[..rank - 2]),
            input_shape[rank - 2] as u64,
        ),
    };
    let (h, k) = (spec.num_heads as u64, spec.key_dim as u64);
    let hk = h * k;
    let bias = u64::from(spec.use_bias);

    let projections = 3 * (d * hk + hk * bias);
    let output = hk * d + d * bias;

    let per_sequence = 3 * t * d * hk // q, k, v projections
        + h * t * t * k // scores
        + h * t * t * k // weighted values
        + t * hk * d; // output projection
    let cx = Complexity::with_cost(lead * per_sequence, projections + output);

    Ok(accumulate(cx, input_shape.to_vec(), prev_cx))
}

/// Reshape with at most one inferred (`-1`) dimension.
pub fn reshape_complexity(
    input_shape: &[usize],
    target: &[i64],
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    let mismatch = || ShapeError::ReshapeMismatch {
        from: input_shape.to_vec(),
        to: target.to_vec(),
    };
    let total = elements(input_shape);
    let inferred = target.iter().filter(|&&d| d == -1).count();
    if inferred > 1 || target.iter().any(|&d| d == 0 || d < -1) {
        return Err(mismatch());
    }
    let known: u64 = target.iter().filter(|&&d| d > 0).map(|&d| d as u64).product();
    if known == 0 || total % known != 0 || (inferred == 0 && known != total) {
        return Err(mismatch());
    }
    let shape = target
        .iter()
        .map(|&d| if d == -1 { (total / known) as usize } else { d as usize })
        .collect();
    Ok(accumulate(Complexity::new(), shape, prev_cx))
}

pub fn permute_complexity(
    input_shape: &[usize],
    perm: &[usize],
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    let mut seen = vec![false; input_shape.len()];
    let valid = perm.len() == input_shape.len()
        && perm.iter().all(|&axis| axis < seen.len() && !std::mem::replace(&mut seen[axis], true));
    if !valid {
        return Err(ShapeError::InvalidPermutation {
            perm: perm.to_vec(),
            shape: input_shape.to_vec(),
        });
    }
    let shape = perm.iter().map(|&axis| input_shape[axis]).collect();
    Ok(accumulate(Complexity::new(), shape, prev_cx))
}

/// Add and multiply need identical shapes; concat joins the channel axis.
pub fn merge_complexity(
    input_shapes: &[&[usize]],
    op: MergeOp,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)> {
    let name = match op {
        MergeOp::Add => "add",
        MergeOp::Multiply => "multiply",
        MergeOp::Concat => "concatenate",
    };
    let (first, rest) = match input_shapes {
        [first, rest @ ..] if !rest.is_empty() => (*first, rest),
        _ => {
            return Err(ShapeError::Arity {
                layer: name,
                expected: 2,
                actual: input_shapes.len(),
            })
        }
    };

    let mut shape = first.to_vec();
    for other in rest {
        let compatible = match op {
            MergeOp::Add | MergeOp::Multiply => shape.as_slice() == *other,
            MergeOp::Concat => {
                !other.is_empty()
                    && shape.len() == other.len()
                    && shape[..shape.len() - 1] == other[..other.len() - 1]
            }
        };
        if !compatible {
            return Err(ShapeError::IncompatibleShapes {
                op: name,
                left: shape,
                right: other.to_vec(),
            });
        }
        if op == MergeOp::Concat {
            let axis = shape.len() - 1;
            shape[axis] += other[axis];
        }
    }
    Ok(accumulate(Complexity::new(), shape, prev_cx))
}

/// Applies `inner` to every slice along axis 0. Weights are shared between
/// slices, so only the non-parameter categories scale with the step count.
pub fn time_distributed_complexity<F>(
    input_shape: &[usize],
    inner: F,
    prev_cx: Option<&Complexity>,
) -> Result<(Complexity, Shape)>
where
    F: FnOnce(&[usize]) -> Result<(Complexity, Shape)>,
{
    let (steps, slice) = match input_shape.split_first() {
        Some((&steps, slice)) if !slice.is_empty() => (steps, slice),
        _ => {
            return Err(ShapeError::RankTooLow {
                layer: "time_distributed",
                min: 2,
                shape: input_shape.to_vec(),
            })
        }
    };
    let (inner_cx, inner_shape) = inner(slice)?;

    let mut cx = Complexity::new();
    for (key, value) in inner_cx.iter() {
        let scale = if key == PARAMS { 1 } else { steps as u64 };
        cx.add_to(key, value.saturating_mul(scale));
    }
    let mut shape = Vec::with_capacity(inner_shape.len() + 1);
    shape.push(steps);
    shape.extend(inner_shape);
    Ok(accumulate(cx, shape, prev_cx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv2d_same_padding_keeps_spatial_dims() {
        let spec = Conv2dSpec {
            padding: Padding::Same,
            ..Conv2dSpec::new(16, (3, 3))
        };
        let (cx, shape) = conv2d_complexity(&[64, 64, 3], &spec, None).unwrap();
        assert_eq!(shape, vec![64, 64, 16]);
        assert_eq!(cx.params(), 3 * 3 * 3 * 16 + 16);
        assert_eq!(cx.flops(), 64 * 64 * 3 * 3 * 3 * 16);
    }

    #[test]
    fn test_conv2d_kernel_overflow_is_an_error() {
        let spec = Conv2dSpec::new(usize::MAX, (3, 3));
        assert_eq!(
            conv2d_complexity(&[8, 8, 2], &spec, None),
            Err(ShapeError::Overflow { layer: "conv2d" })
        );
    }

    #[test]
    fn test_time_distributed_saturates() {
        let (cx, shape) = time_distributed_complexity(
            &[usize::MAX, 4],
            |slice| Ok((Complexity::with_cost(2, 3), slice.to_vec())),
            None,
        )
        .unwrap();
        assert_eq!(shape, vec![usize::MAX, 4]);
        assert_eq!(cx.flops(), u64::MAX);
        assert_eq!(cx.params(), 3);
    }

    #[test]
    fn test_conv2d_valid_and_strided() {
        let spec = Conv2dSpec {
            strides: (2, 2),
            use_bias: false,
            ..Conv2dSpec::new(8, (3, 3))
        };
        let (cx, shape) = conv2d_complexity(&[64, 8, 1], &spec, None).unwrap();
        assert_eq!(shape, vec![31, 3, 8]);
        assert_eq!(cx.params(), 72);
        assert_eq!(cx.flops(), 31 * 3 * 72);
    }

    #[test]
    fn test_conv2d_grouped() {
        let spec = Conv2dSpec {
            groups: 2,
            padding: Padding::Same,
            ..Conv2dSpec::new(4, (3, 3))
        };
        let (cx, _) = conv2d_complexity(&[8, 8, 8], &spec, None).unwrap();
        assert_eq!(cx.params(), 9 * 4 * 4 + 4);

        let bad = Conv2dSpec { groups: 3, ..spec };
        assert!(matches!(
            conv2d_complexity(&[8, 8, 8], &bad, None),
            Err(ShapeError::GroupMismatch { channels: 8, groups: 3, .. })
        ));
    }

    #[test]
    fn test_conv2d_rejects_wrong_rank_and_oversized_kernel() {
        let spec = Conv2dSpec::new(4, (5, 5));
        assert!(matches!(
            conv2d_complexity(&[10, 3], &spec, None),
            Err(ShapeError::InvalidRank { expected: 3, .. })
        ));
        assert!(matches!(
            conv2d_complexity(&[4, 10, 3], &spec, None),
            Err(ShapeError::WindowTooLarge { window: 5, dim: 4, .. })
        ));
    }

    #[test]
    fn test_prev_cx_is_accumulated() {
        let prev = Complexity::with_cost(100, 10);
        let (cx, _) = norm_complexity(&[4, 4, 2], Some(&prev)).unwrap();
        assert_eq!(cx.flops(), 100 + 32);
        assert_eq!(cx.params(), 10 + 8);
    }

    #[test]
    fn test_pool_stride_defaults_to_pool_size() {
        let (cx, shape) = pool2d_complexity(&[64, 64, 16], &Pool2dSpec::new((2, 2)), None).unwrap();
        assert!(cx.is_empty());
        assert_eq!(shape, vec![32, 32, 16]);

        let (_, shape) = pool2d_complexity(&[100, 64, 8], &Pool2dSpec::new((5, 1)), None).unwrap();
        assert_eq!(shape, vec![20, 64, 8]);

        let spec = Pool2dSpec {
            strides: Some((2, 2)),
            padding: Padding::Same,
            ..Pool2dSpec::new((3, 3))
        };
        let (_, shape) = pool2d_complexity(&[29, 1, 32], &spec, None).unwrap();
        assert_eq!(shape, vec![15, 1, 32]);
    }

    #[test]
    fn test_dense_batches_leading_axes() {
        let (cx, shape) = dense_complexity(&[10, 32], 16, true, None).unwrap();
        assert_eq!(shape, vec![10, 16]);
        assert_eq!(cx.params(), 32 * 16 + 16);
        assert_eq!(cx.flops(), 10 * 32 * 16);
    }

    #[test]
    fn test_bidirectional_merge_modes() {
        let (cx, shape) = bidirectional_complexity(&[10, 8], 8, MergeMode::Mul, None).unwrap();
        assert_eq!(shape, vec![10, 8]);
        assert_eq!(cx.params(), 2 * 3 * (64 + 64 + 16));
        assert_eq!(cx.flops(), 2 * 10 * 3 * (64 + 64));

        let (concat_cx, shape) =
            bidirectional_complexity(&[10, 8], 8, MergeMode::Concat, None).unwrap();
        assert_eq!(shape, vec![10, 16]);
        assert_eq!(concat_cx, cx);
    }

    #[test]
    fn test_attention_cost_split() {
        let spec = AttentionSpec {
            num_heads: 2,
            key_dim: 4,
            use_bias: true,
            axes: AttentionAxes::Joint,
        };
        let (cx, shape) = attention_complexity(&[10, 8], &spec, None).unwrap();
        assert_eq!(shape, vec![10, 8]);
        assert_eq!(cx.params(), 3 * (64 + 8) + 64 + 8);
        assert_eq!(cx.flops(), 1920 + 800 + 800 + 640);

        let sequence = AttentionSpec { axes: AttentionAxes::Sequence, ..spec };
        let (same, _) = attention_complexity(&[10, 8], &sequence, None).unwrap();
        assert_eq!(same, cx);
    }

    #[test]
    fn test_attention_joint_axes_span_all_positions() {
        let spec = AttentionSpec {
            num_heads: 2,
            key_dim: 4,
            use_bias: true,
            axes: AttentionAxes::default(),
        };
        // 30 positions attend to each other
        let (joint, shape) = attention_complexity(&[3, 10, 8], &spec, None).unwrap();
        assert_eq!(shape, vec![3, 10, 8]);
        assert_eq!(joint.flops(), 3 * 30 * 64 + 2 * 2 * 30 * 30 * 4 + 30 * 64);

        // three independent sequences of 10
        let sequence = AttentionSpec { axes: AttentionAxes::Sequence, ..spec };
        let (split, _) = attention_complexity(&[3, 10, 8], &sequence, None).unwrap();
        assert_eq!(split.flops(), 3 * (1920 + 800 + 800 + 640));
        assert_eq!(split.params(), joint.params());
    }

    #[test]
    fn test_reshape_infers_one_dimension() {
        let (_, shape) = reshape_complexity(&[10, 4, 2], &[-1, 8], None).unwrap();
        assert_eq!(shape, vec![10, 8]);
        assert!(reshape_complexity(&[10, 4, 2], &[-1, 3], None).is_err());
        assert!(reshape_complexity(&[10, 4, 2], &[-1, -1], None).is_err());
        assert!(reshape_complexity(&[10, 4, 2], &[80], None).is_ok());
    }

    #[test]
    fn test_permute_rejects_repeated_axes() {
        let (_, shape) = permute_complexity(&[4, 5, 8], &[1, 0, 2], None).unwrap();
        assert_eq!(shape, vec![5, 4, 8]);
        assert!(permute_complexity(&[4, 5, 8], &[0, 0, 2], None).is_err());
    }

    #[test]
    fn test_merge_shapes() {
        let (_, shape) = merge_complexity(&[&[8, 8, 4], &[8, 8, 12]], MergeOp::Concat, None).unwrap();
        assert_eq!(shape, vec![8, 8, 16]);
        assert!(matches!(
            merge_complexity(&[&[8, 8, 4], &[4, 4, 4]], MergeOp::Add, None),
            Err(ShapeError::IncompatibleShapes { op: "add", .. })
        ));
    }

    #[test]
    fn test_time_distributed_shares_parameters() {
        let (cx, shape) =
            time_distributed_complexity(&[10, 32], |s| dense_complexity(s, 16, true, None), None)
                .unwrap();
        assert_eq!(shape, vec![10, 16]);
        assert_eq!(cx.params(), 528);
        assert_eq!(cx.flops(), 10 * 512);
    }

    #[test]
    fn test_expert_conv_adds_routing_and_kernel_mixing() {
        let conv = Conv2dSpec {
            padding: Padding::Same,
            ..Conv2dSpec::new(4, (3, 3))
        };
        let spec = ExpertConv2dSpec { conv, num_experts: 4, routing: Activation::Softmax };
        let (cx, shape) = expert_conv2d_complexity(&[8, 8, 2], &spec, None).unwrap();
        let kernel = 9 * 2 * 4 + 4;
        assert_eq!(shape, vec![8, 8, 4]);
        assert_eq!(cx.params(), 4 * kernel + 2 * 4 + 4);
        assert_eq!(cx.flops(), 64 * 72 + 2 * 4 + 4 * kernel);

        let gated = ExpertConv2dSpec { routing: Activation::Relu, ..spec };
        assert_eq!(expert_conv2d_complexity(&[8, 8, 2], &gated, None).unwrap().0, cx);
    }
}
