use std::num::NonZeroUsize;

use log::debug;
use rand::Rng;

use crate::{
    Result, WeightVector,
    arch::{Model, loss::LossFn},
    dataset::DataLoader,
    optimization::Optimizer,
};

/// What a local training run leaves behind.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// The model parameters after the last epoch.
    pub weights: WeightVector,
    /// The mean training loss of every epoch, weighted by batch size.
    pub epoch_losses: Vec<f32>,
}

/// Runs a fixed amount of epochs of mini-batch optimization over a model.
pub struct LocalTrainer<O: Optimizer, L: LossFn> {
    optimizer: O,
    loss_fn: L,
    epochs: NonZeroUsize,
}

impl<O: Optimizer, L: LossFn> LocalTrainer<O, L> {
    /// Creates a new `LocalTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer, its state lives as long as the trainer.
    /// * `loss_fn` - The loss function to minimize.
    /// * `epochs` - The amount of passes over the data.
    pub fn new(optimizer: O, loss_fn: L, epochs: NonZeroUsize) -> Self {
        Self {
            optimizer,
            loss_fn,
            epochs,
        }
    }

    /// Trains `model` in place.
    ///
    /// Every epoch is exhausted, there's no early stopping.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `loader` - The training examples.
    ///
    /// # Returns
    /// The trained weights and the loss of each epoch.
    pub fn train<R: Rng>(
        &mut self,
        model: &mut dyn Model,
        loader: &mut DataLoader<R>,
    ) -> Result<TrainOutput> {
        let mut epoch_losses = Vec::with_capacity(self.epochs.get());

        for epoch in 0..self.epochs.get() {
            let mut total_loss = 0.0_f64;
            let mut seen = 0;

            for (x, y) in loader.epoch() {
                let y_pred = model.forward(x)?;
                total_loss += self.loss_fn.loss(y_pred.view(), y)? as f64 * x.nrows() as f64;
                seen += x.nrows();

                let d = self.loss_fn.loss_prime(y_pred.view(), y)?;
                model.backward(d)?;

                let (params, grad) = model.params_and_grad();
                self.optimizer.update_params(params, grad)?;
            }

            let loss = if seen == 0 {
                0.
            } else {
                (total_loss / seen as f64) as f32
            };

            debug!(epoch = epoch, loss = loss, examples = seen; "local epoch finished");
            epoch_losses.push(loss);
        }

        Ok(TrainOutput {
            weights: model.get_weights()?,
            epoch_losses,
        })
    }
}
