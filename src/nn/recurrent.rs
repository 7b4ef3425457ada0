//! Recurrent layers over `[time, features]` sequences.

use crate::complexity::MergeMode;
use crate::graph::{GraphResult, LayerKind};
use crate::nn::module::{Layer, Module};
use crate::tensor::Tensor;

/// GRU returning the hidden state of every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gru {
    pub units: usize,
}

impl Gru {
    pub fn new(units: usize) -> Self {
        Self { units }
    }
}

impl Layer for Gru {
    fn kind(&self) -> LayerKind {
        LayerKind::Gru { units: self.units }
    }
}

impl Module for Gru {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

/// A forward and a backward [`Gru`] whose outputs are combined by `merge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bidirectional {
    pub units: usize,
    pub merge: MergeMode,
}

impl Bidirectional {
    pub fn new(layer: Gru, merge: MergeMode) -> Self {
        Self {
            units: layer.units,
            merge,
        }
    }
}

impl Layer for Bidirectional {
    fn kind(&self) -> LayerKind {
        LayerKind::Bidirectional {
            units: self.units,
            merge: self.merge,
        }
    }
}

impl Module for Bidirectional {
    fn forward(&self, inputs: &Tensor) -> GraphResult<Tensor> {
        inputs.apply(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::GraphContext;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_bidirectional_concat_doubles_units() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![10, 8]);
        let layer = Bidirectional::new(Gru::new(4), MergeMode::Concat);
        assert_eq!(layer.forward(&input).unwrap().shape().unwrap(), vec![10, 8]);

        let layer = Bidirectional::new(Gru::new(4), MergeMode::Sum);
        assert_eq!(layer.forward(&input).unwrap().shape().unwrap(), vec![10, 4]);
    }

    #[test]
    fn test_gru_needs_rank_two() {
        let context = Rc::new(RefCell::new(GraphContext::new()));
        let input = Tensor::new_input(&context, "input", vec![10, 4, 2]);
        assert!(Gru::new(4).forward(&input).is_err());
    }
}
