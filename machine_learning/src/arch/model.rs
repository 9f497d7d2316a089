use ndarray::{Array2, ArrayView2};

use crate::{Result, WeightVector};

/// A trainable model holding its own flat parameter and gradient buffers.
///
/// The parameters are exposed to the outside world as a `WeightVector`, one tensor per
/// parameter tensor of the architecture, always in the same order.
pub trait Model: Send {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the shape of each parameter tensor, in order.
    fn shapes(&self) -> Vec<Vec<usize>>;

    /// Returns every parameter, tensor after tensor.
    fn params(&self) -> &[f32];

    /// Gives mutable access to the parameters alongside the gradient of the last backward pass.
    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]);

    /// Computes the model output for a batch, keeping what `backward` needs.
    ///
    /// # Arguments
    /// * `x` - The input batch, one example per row.
    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss for the last `forward` batch.
    ///
    /// # Arguments
    /// * `d` - The derivative of the loss with respect to the last output.
    fn backward(&mut self, d: Array2<f32>) -> Result<()>;

    /// Returns a snapshot of the current parameters.
    fn get_weights(&self) -> Result<WeightVector> {
        WeightVector::from_flat(self.params(), &self.shapes())
    }

    /// Overwrites every parameter with `weights`.
    ///
    /// # Returns
    /// A `SizeMismatch` or `ShapeMismatch` if `weights` doesn't match this model's layout, in
    /// which case the parameters are left untouched.
    fn set_weights(&mut self, weights: &WeightVector) -> Result<()> {
        weights.check_shapes(&self.shapes())?;

        let (params, _) = self.params_and_grad();
        let mut offset = 0;
        for tensor in weights.tensors() {
            for (dst, src) in params[offset..].iter_mut().zip(tensor.iter()) {
                *dst = *src;
            }
            offset += tensor.len();
        }

        Ok(())
    }
}
