use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer computing `act_fn(x · w + b)`.
///
/// Its parameters are laid out as the `(in, out)` weight matrix followed by the `out` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of input and output features.
    /// * `act_fn` - The activation applied to the output, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of weights, the rest of the parameters are biases.
    pub fn weights_size(&self) -> usize {
        self.dim.0 * self.dim.1
    }

    pub fn shapes(&self) -> Vec<Vec<usize>> {
        vec![vec![self.dim.0, self.dim.1], vec![self.dim.1]]
    }

    /// Makes a forward pass, keeping what's needed for the backward pass.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the model parameters.
    /// * `x` - The input batch, shaped `(batch, in)`.
    ///
    /// # Returns
    /// The output batch, shaped `(batch, out)`.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;

        self.x = x.to_owned();

        let a = match self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.apply(z)),
            None => z.clone(),
        };

        self.z = z;
        Ok(a)
    }

    /// Makes a backward pass, writing this layer's gradient into `grad`.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the model parameters.
    /// * `grad` - This layer's slice of the model gradient.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense output delta",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        let mut d = d.to_owned();
        if let Some(act_fn) = self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.derivative(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let (dw_raw, db_raw) = grad.split_at_mut(self.weights_size());
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let (w_raw, b_raw) = params.split_at(self.weights_size());
        let weights = ArrayView2::from_shape(self.dim, w_raw)?;
        let biases = ArrayView1::from_shape(self.dim.1, b_raw)?;
        Ok((weights, biases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_is_an_affine_map() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2.0, -1.0, 0.5];

        let y = dense.forward(&params, array![[1.0, 1.0], [3.0, 2.0]].view()).unwrap();
        assert_eq!(y, array![[1.5_f32], [4.5]]);
    }

    #[test]
    fn backward_accumulates_over_the_batch() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2.0, -1.0, 0.5];
        let mut grad = [0.0; 3];

        dense.forward(&params, array![[1.0, 1.0], [3.0, 2.0]].view()).unwrap();
        let dx = dense
            .backward(&params, &mut grad, array![[1.0], [1.0]].view())
            .unwrap();

        assert_eq!(grad, [4.0, 3.0, 2.0]);
        assert_eq!(dx, array![[2.0_f32, -1.0], [2.0, -1.0]]);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let mut dense = Dense::new((3, 1), None);
        let params = [0.0; 4];

        assert!(dense.forward(&params, Array2::zeros((2, 2)).view()).is_err());
    }
}
