use ndarray::{ArrayView2, Axis};

use crate::{MlErr, Result};

/// Decides whether a prediction matches its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyRule {
    /// The index of the highest output equals the class label.
    ArgMax,
    /// The single output rounded to the nearest integer equals the label.
    Rounded,
}

impl AccuracyRule {
    /// Counts the correct predictions in a batch.
    ///
    /// # Arguments
    /// * `y_pred` - The model output, one row per example.
    /// * `y` - The labels, a single column.
    pub fn correct(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<usize> {
        if y_pred.nrows() != y.nrows() || y.ncols() != 1 {
            return Err(MlErr::SizeMismatch {
                what: "accuracy labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        let labels = y.column(0);
        let hits = y_pred
            .axis_iter(Axis(0))
            .zip(labels)
            .filter(|(row, label)| match self {
                Self::ArgMax => Self::argmax(row.iter()) as f32 == **label,
                Self::Rounded => row.iter().next().is_some_and(|p| p.round() == **label),
            })
            .count();

        Ok(hits)
    }

    fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
        let mut best = (0, f32::NEG_INFINITY);
        for (i, &v) in values.enumerate() {
            if v > best.1 {
                best = (i, v);
            }
        }
        best.0
    }
}
