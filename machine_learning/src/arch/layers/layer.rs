use ndarray::{Array2, ArrayView2};

use super::{Dense, Embedding};
use crate::{Result, arch::activations::ActFn};

/// A building block of a `Sequential` model.
#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    Embedding(Embedding),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn embedding(dim: (usize, usize)) -> Self {
        Self::Embedding(Embedding::new(dim))
    }

    /// Returns the amount of parameters in this layer.
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::Embedding(l) => l.size(),
        }
    }

    /// Returns the shape of each of this layer's parameter tensors, in parameter order.
    pub fn shapes(&self) -> Vec<Vec<usize>> {
        match self {
            Self::Dense(l) => l.shapes(),
            Self::Embedding(l) => l.shapes(),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x),
            Self::Embedding(l) => l.forward(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
            Self::Embedding(l) => l.backward(grad, d),
        }
    }
}
