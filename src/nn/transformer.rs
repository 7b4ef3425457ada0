//! One Transformer encoder layer in the graph architecture.

use crate::complexity::AttentionAxes;
use crate::graph::{GraphError, GraphResult};
use crate::nn::{Activation, Dropout, FeedForward, LayerNorm, Module, MultiHeadAttention};
use crate::tensor::Tensor;

/// Post-norm Transformer encoder layer.
///
/// ```text
/// x = LayerNorm(x + Dropout(MHA(x)))
/// x = LayerNorm(x + FeedForward(x))
/// ```
///
/// The input channel count must equal `d_model`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformerEncoderLayer {
    d_model: usize,
    attention: MultiHeadAttention,
    dropout: Dropout,
    norm1: LayerNorm,
    feed_forward: FeedForward,
    norm2: LayerNorm,
}

impl TransformerEncoderLayer {
    /// Heads have width `d_model / num_heads`.
    pub fn new(
        d_model: usize,
        num_heads: usize,
        dim_feedforward: usize,
        activation: Activation,
        dropout: f32,
    ) -> Self {
        let key_dim = if num_heads == 0 { 0 } else { d_model / num_heads };
        Self {
            d_model,
            attention: MultiHeadAttention::new(num_heads, key_dim),
            dropout: Dropout::new(dropout),
            norm1: LayerNorm::new(),
            feed_forward: FeedForward::new(d_model, dim_feedforward, activation, dropout),
            norm2: LayerNorm::new(),
        }
    }

    /// Restricts self-attention to the given axes. Defaults to joint
    /// attention over every non-feature axis.
    pub fn with_attention_axes(mut self, axes: AttentionAxes) -> Self {
        self.attention = self.attention.with_axes(axes);
        self
    }
}

impl Module for TransformerEncoderLayer {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        let channels = inputs.channels()?;
        if channels != self.d_model {
            return Err(GraphError::ChannelMismatch {
                layer: "transformer_encoder_layer",
                expected: self.d_model,
                actual: channels,
            });
        }

        let attn_out = self.attention.forward(inputs)?;
        let attn_out = self.dropout.forward(&attn_out)?;
        let x = self.norm1.forward(&(inputs + &attn_out)?)?;

        let ff_out = self.feed_forward.forward(&x)?;
        self.norm2.forward(&(&x + &ff_out)?)
    }
}
