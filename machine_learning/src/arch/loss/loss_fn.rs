use comms::specs::machine_learning::LossFnSpec;
use ndarray::{Array2, ArrayView2};

use super::{BinaryCrossEntropy, CrossEntropy};
use crate::{MlErr, Result};

pub trait LossFn {
    /// Computes the mean loss of a batch.
    ///
    /// # Arguments
    /// * `y_pred` - The model output, shaped `(batch, outputs)`.
    /// * `y` - The expected labels, shaped `(batch, 1)` or like `y_pred`.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>;

    /// Computes the derivative of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>>;
}

/// Every loss function a task can be trained with.
#[derive(Clone, Copy, Debug)]
pub enum Loss {
    CrossEntropy(CrossEntropy),
    BinaryCrossEntropy(BinaryCrossEntropy),
}

impl Loss {
    pub fn from_spec(spec: LossFnSpec) -> Self {
        match spec {
            LossFnSpec::CrossEntropy => Self::CrossEntropy(CrossEntropy),
            LossFnSpec::BinaryCrossEntropy => Self::BinaryCrossEntropy(BinaryCrossEntropy::default()),
        }
    }
}

impl LossFn for Loss {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        match self {
            Self::CrossEntropy(l) => l.loss(y_pred, y),
            Self::BinaryCrossEntropy(l) => l.loss(y_pred, y),
        }
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Self::CrossEntropy(l) => l.loss_prime(y_pred, y),
            Self::BinaryCrossEntropy(l) => l.loss_prime(y_pred, y),
        }
    }
}

/// Fails unless both batches have the same amount of rows.
pub(super) fn check_rows(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<()> {
    if y_pred.nrows() != y.nrows() {
        return Err(MlErr::SizeMismatch {
            what: "label rows",
            got: y.nrows(),
            expected: y_pred.nrows(),
        });
    }

    Ok(())
}
