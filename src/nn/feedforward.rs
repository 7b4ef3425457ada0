//! Module implementing the position-wise FeedForward layer of a Transformer.

use crate::graph::GraphResult;
use crate::nn::{Activation, Dense, Dropout, Module};
use crate::tensor::Tensor;

/// FeedForward layer, a standard component of the Transformer block.
///
/// Two dense layers with dropout after each. The first expands the width to
/// `hidden_dim` and applies `activation`, the second projects back to
/// `embed_dim`. Applied to every position independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedForward {
    /// First dense layer, expanding the width.
    linear1: Dense,
    /// Second dense layer, compressing back to the embedding width.
    linear2: Dense,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(embed_dim: usize, hidden_dim: usize, activation: Activation, dropout: f32) -> Self {
        Self {
            linear1: Dense::new(hidden_dim).with_activation(Some(activation)),
            linear2: Dense::new(embed_dim),
            dropout: Dropout::new(dropout),
        }
    }
}

impl Module for FeedForward {
    /// Forward pass: `Dense -> act -> Dropout -> Dense -> Dropout`.
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        let x = self.linear1.forward(inputs)?;
        let x = self.dropout.forward(&x)?;
        let x = self.linear2.forward(&x)?;
        self.dropout.forward(&x)
    }
}
