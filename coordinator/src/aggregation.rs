use client::FitResult;
use comms::specs::federated::EvalResult;
use machine_learning::WeightVector;
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;

use crate::error::{CoordinatorErr, Result};

/// Combines the clients' answers of one round into global values.
pub trait Aggregator: Send + Sync {
    /// Combines the locally trained weights into the next global weights.
    ///
    /// # Arguments
    /// * `results` - Every collected fit result, in any order.
    ///
    /// # Returns
    /// The combined weights, an `Aggregation` error if there is nothing to combine or a
    /// `WeightShapeMismatch` naming the first result whose layout differs from the first one.
    fn combine(&self, results: &[FitResult]) -> Result<WeightVector>;

    /// Combines the clients' evaluations into a single global evaluation.
    fn combine_evaluations(&self, results: &[EvalResult]) -> Result<EvalResult>;
}

/// Federated averaging: every client contributes proportionally to the amount of examples it
/// trained on.
///
/// Sums are accumulated in `f64` so the output doesn't depend on the order of the results
/// beyond `f32` rounding.
#[derive(Debug, Clone, Copy, Default)]
pub struct FedAvg;

impl FedAvg {
    fn total_examples<I: IntoIterator<Item = usize>>(counts: I) -> Result<usize> {
        let mut counts = counts.into_iter().peekable();
        if counts.peek().is_none() {
            return Err(CoordinatorErr::Aggregation("no results to combine"));
        }

        match counts.sum() {
            0 => Err(CoordinatorErr::Aggregation("results hold zero examples")),
            total => Ok(total),
        }
    }
}

impl Aggregator for FedAvg {
    fn combine(&self, results: &[FitResult]) -> Result<WeightVector> {
        let total = Self::total_examples(results.iter().map(|r| r.num_examples))? as f64;

        let shapes = results[0].weights.shapes();
        for (result, fit) in results.iter().enumerate().skip(1) {
            fit.weights
                .check_shapes(&shapes)
                .map_err(|source| CoordinatorErr::WeightShapeMismatch { result, source })?;
        }

        let tensors = shapes
            .par_iter()
            .enumerate()
            .map(|(position, shape)| {
                let mut acc = ArrayD::<f64>::zeros(IxDyn(shape));

                for fit in results {
                    let scale = fit.num_examples as f64 / total;
                    acc.zip_mut_with(&fit.weights.tensors()[position], |a, &w| {
                        *a += scale * w as f64;
                    });
                }

                acc.mapv(|a| a as f32)
            })
            .collect();

        Ok(WeightVector::new(tensors))
    }

    fn combine_evaluations(&self, results: &[EvalResult]) -> Result<EvalResult> {
        let num_examples = Self::total_examples(results.iter().map(|r| r.num_examples))?;
        let total = num_examples as f64;

        let (loss, accuracy) = results.iter().fold((0.0, 0.0), |(loss, accuracy), r| {
            let scale = r.num_examples as f64 / total;
            (
                loss + scale * r.loss as f64,
                accuracy + scale * r.accuracy as f64,
            )
        });

        Ok(EvalResult {
            loss: loss as f32,
            accuracy: accuracy as f32,
            num_examples,
        })
    }
}
