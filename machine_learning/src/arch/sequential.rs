use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Layer};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl Sequential {
    /// Creates a new `Sequential` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        let size = layers.iter().map(Layer::size).sum();

        Self {
            layers,
            params: vec![0.; size],
            grad: vec![0.; size],
        }
    }

    /// Creates a new `Sequential` with the given parameters.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `params` - Every layer's parameters, laid out in layer order.
    ///
    /// # Returns
    /// The model or a `SizeMismatch` if `params` doesn't fit the layers.
    pub fn with_params<I>(layers: I, params: Vec<f32>) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let mut model = Self::new(layers);
        if params.len() != model.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "sequential params",
                got: params.len(),
                expected: model.params.len(),
            });
        }

        model.params = params;
        Ok(model)
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn shapes(&self) -> Vec<Vec<usize>> {
        self.layers.iter().flat_map(Layer::shapes).collect()
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut rest = self.params.as_slice();
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (params, tail) = rest.split_at(layer.size());
            a = layer.forward(params, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    fn backward(&mut self, mut d: Array2<f32>) -> Result<()> {
        let mut end = self.params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(
                &self.params[start..end],
                &mut self.grad[start..end],
                d.view(),
            )?;
            end = start;
        }

        Ok(())
    }
}
