use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Adam, with bias corrected first and second moment estimates.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,
    m: Box<[f32]>,
    v: Box<[f32]>,
}

impl Adam {
    /// # Arguments
    /// * `len` - The amount of parameters of the model.
    /// * `learning_rate` - The length of a step.
    /// * `beta1` - The decay of the gradient mean.
    /// * `beta2` - The decay of the squared gradient mean.
    /// * `epsilon` - Keeps the division finite when gradients vanish.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            step: 0,
            m: vec![0.; len].into(),
            v: vec![0.; len].into(),
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params, grad)?;
        check_sizes(&self.m, grad)?;

        self.step = self.step.saturating_add(1);
        let (b1, b2) = (self.beta1, self.beta2);
        let m_correction = 1. / (1. - b1.powi(self.step));
        let v_correction = 1. / (1. - b2.powi(self.step));

        let moments = self.m.iter_mut().zip(self.v.iter_mut());
        for ((p, &g), (m, v)) in params.iter_mut().zip(grad).zip(moments) {
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;

            let m_hat = *m * m_correction;
            let v_hat = *v * v_correction;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }

        Ok(())
    }
}
