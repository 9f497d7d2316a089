use comms::specs::federated::EvalResult;
use ndarray::ArrayView2;

use super::AccuracyRule;
use crate::{Result, arch::{Model, loss::LossFn}};

/// Measures a model over some examples without updating it.
pub struct LocalEvaluator<L: LossFn> {
    loss_fn: L,
    accuracy: AccuracyRule,
}

impl<L: LossFn> LocalEvaluator<L> {
    pub fn new(loss_fn: L, accuracy: AccuracyRule) -> Self {
        Self { loss_fn, accuracy }
    }

    /// Makes a single pass over `batches`.
    ///
    /// # Arguments
    /// * `model` - The model to evaluate, its parameters are never written.
    /// * `batches` - The examples, batched.
    ///
    /// # Returns
    /// The loss and accuracy averaged over every example, weighted by batch size. No examples
    /// yield zero loss and zero accuracy.
    pub fn evaluate<'a, I>(&self, model: &mut dyn Model, batches: I) -> Result<EvalResult>
    where
        I: IntoIterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        let mut total_loss = 0.0_f64;
        let mut correct = 0;
        let mut seen = 0;

        for (x, y) in batches {
            let y_pred = model.forward(x)?;
            total_loss += self.loss_fn.loss(y_pred.view(), y)? as f64 * x.nrows() as f64;
            correct += self.accuracy.correct(y_pred.view(), y)?;
            seen += x.nrows();
        }

        if seen == 0 {
            return Ok(EvalResult {
                loss: 0.,
                accuracy: 0.,
                num_examples: 0,
            });
        }

        Ok(EvalResult {
            loss: (total_loss / seen as f64) as f32,
            accuracy: (correct as f64 / seen as f64) as f32,
            num_examples: seen,
        })
    }
}
