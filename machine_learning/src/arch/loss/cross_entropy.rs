use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::{LossFn, loss_fn::check_rows};
use crate::{MlErr, Result};

/// Categorical cross-entropy over raw logits.
///
/// The model output is taken as unnormalized scores, one column per class, and the labels as a
/// single column of class indices. The softmax is applied here, so the last layer of the model
/// must not have an activation.
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    fn class(label: f32, classes: usize) -> Result<usize> {
        if label < 0. || label.fract() != 0. || label as usize >= classes {
            return Err(MlErr::InvalidLabel { label, classes });
        }

        Ok(label as usize)
    }

    fn labels(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<Vec<usize>> {
        check_rows(y_pred, y)?;
        if y.ncols() != 1 {
            return Err(MlErr::SizeMismatch {
                what: "cross entropy label columns",
                got: y.ncols(),
                expected: 1,
            });
        }

        y.iter()
            .map(|&label| Self::class(label, y_pred.ncols()))
            .collect()
    }

    /// Returns `log(sum(exp(row)))` without overflowing.
    fn log_sum_exp(row: ArrayView1<f32>) -> f32 {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        max + row.mapv(|v| (v - max).exp()).sum().ln()
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let labels = Self::labels(&y_pred, &y)?;
        if labels.is_empty() {
            return Ok(0.);
        }

        let total: f32 = y_pred
            .axis_iter(Axis(0))
            .zip(&labels)
            .map(|(row, &class)| Self::log_sum_exp(row) - row[class])
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        let labels = Self::labels(&y_pred, &y)?;
        let n = labels.len().max(1) as f32;

        let mut d = y_pred.to_owned();
        for (mut row, &class) in d.axis_iter_mut(Axis(0)).zip(&labels) {
            let lse = Self::log_sum_exp(row.view());
            row.mapv_inplace(|v| (v - lse).exp() / n);
            row[class] -= 1. / n;
        }

        Ok(d)
    }
}
