use ndarray::{Array2, ArrayView2, Zip};

use super::{LossFn, loss_fn::check_rows};
use crate::{MlErr, Result};

/// Binary cross-entropy over probabilities.
///
/// The model output must already be a probability (a sigmoid output layer), predictions are
/// clamped to `[epsilon, 1 - epsilon]` so saturated outputs keep a finite loss.
#[derive(Clone, Copy, Debug)]
pub struct BinaryCrossEntropy {
    epsilon: f32,
}

impl BinaryCrossEntropy {
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    fn check(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<()> {
        check_rows(y_pred, y)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "binary cross entropy labels",
                got: y.len(),
                expected: y_pred.len(),
            });
        }

        match y.iter().find(|&&label| !(0. ..=1.).contains(&label)) {
            Some(&label) => Err(MlErr::InvalidLabel { label, classes: 2 }),
            None => Ok(()),
        }
    }

    fn clamp(&self, p: f32) -> f32 {
        p.clamp(self.epsilon, 1. - self.epsilon)
    }
}

impl Default for BinaryCrossEntropy {
    fn default() -> Self {
        Self::new(1e-7)
    }
}

impl LossFn for BinaryCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        Self::check(&y_pred, &y)?;
        if y.is_empty() {
            return Ok(0.);
        }

        let total = Zip::from(&y_pred).and(&y).fold(0., |acc, &p, &t| {
            let p = self.clamp(p);
            acc - (t * p.ln() + (1. - t) * (1. - p).ln())
        });

        Ok(total / y.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        Self::check(&y_pred, &y)?;
        let n = y.len().max(1) as f32;

        Ok(Zip::from(&y_pred).and(&y).map_collect(|&p, &t| {
            let p = self.clamp(p);
            (p - t) / (p * (1. - p) * n)
        }))
    }
}
