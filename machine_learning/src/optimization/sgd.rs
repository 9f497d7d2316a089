use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Stochastic gradient descent, optionally with classical momentum.
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f32,
    momentum: Option<Momentum>,
}

#[derive(Debug)]
struct Momentum {
    factor: f32,
    velocity: Box<[f32]>,
}

impl Sgd {
    /// Plain gradient descent, every step is `-learning_rate * grad`.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            momentum: None,
        }
    }

    /// Gradient descent accumulating a velocity `v = factor * v + grad` for `len` parameters.
    pub fn with_momentum(len: usize, learning_rate: f32, factor: f32) -> Self {
        Self {
            learning_rate,
            momentum: Some(Momentum {
                factor,
                velocity: vec![0.; len].into(),
            }),
        }
    }
}

impl Optimizer for Sgd {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params, grad)?;
        let lr = self.learning_rate;

        let Some(Momentum { factor, velocity }) = &mut self.momentum else {
            params.iter_mut().zip(grad).for_each(|(p, g)| *p -= lr * g);
            return Ok(());
        };

        check_sizes(&velocity[..], grad)?;
        for ((p, g), v) in params.iter_mut().zip(grad).zip(velocity.iter_mut()) {
            *v = *factor * *v + g;
            *p -= lr * *v;
        }

        Ok(())
    }
}
