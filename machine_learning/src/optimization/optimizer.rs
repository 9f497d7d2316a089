use comms::specs::machine_learning::OptimizerSpec;

use super::{Adam, Sgd};
use crate::{MlErr, Result};

/// Turns the gradient of a batch into a parameter update.
pub trait Optimizer {
    /// Updates the parameters using the gradient of the last batch.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grad` - The gradient of the loss with respect to `params`.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `params` and `grad`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;
}

/// Every optimizer a client can train with.
#[derive(Debug)]
pub enum Optim {
    Adam(Adam),
    Sgd(Sgd),
}

impl Optim {
    /// Builds a fresh optimizer, with zeroed state, for a model of `len` parameters.
    ///
    /// # Arguments
    /// * `spec` - The algorithm and its hyperparameters.
    /// * `learning_rate` - The step length of this round.
    /// * `len` - The amount of parameters of the model.
    pub fn from_spec(spec: OptimizerSpec, learning_rate: f32, len: usize) -> Self {
        match spec {
            OptimizerSpec::Adam {
                beta1,
                beta2,
                epsilon,
            } => Self::Adam(Adam::new(len, learning_rate, beta1, beta2, epsilon)),
            OptimizerSpec::GradientDescent => Self::Sgd(Sgd::new(learning_rate)),
            OptimizerSpec::GradientDescentWithMomentum { momentum } => {
                Self::Sgd(Sgd::with_momentum(len, learning_rate, momentum))
            }
        }
    }
}

impl Optimizer for Optim {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        match self {
            Self::Adam(adam) => adam.update_params(params, grad),
            Self::Sgd(sgd) => sgd.update_params(params, grad),
        }
    }
}

pub(super) fn check_sizes(params: &[f32], grad: &[f32]) -> Result<()> {
    if params.len() != grad.len() {
        return Err(MlErr::SizeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}
