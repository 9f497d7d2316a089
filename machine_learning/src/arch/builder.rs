use comms::specs::machine_learning::{LayerSpec, ModelSpec, ParamGenSpec};
use rand::{SeedableRng, rngs::StdRng};

use super::{Model, Sequential, layers::Layer};
use crate::{MlErr, Result, initialization::Initializer};

/// Builds initialized `Model`s given a specification.
///
/// Two builders created with the same seed build models with identical parameters, which is how
/// every participant of a federation starts from the same global model.
pub struct ModelBuilder {
    rng: StdRng,
}

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    ///
    /// # Arguments
    /// * `seed` - The seed for the initializers, a random one is used if absent.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self { rng }
    }

    /// Builds a new model following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the model.
    ///
    /// # Returns
    /// The model, or an error if an initializer or a layer dimension is invalid.
    pub fn build(&mut self, spec: &ModelSpec) -> Result<Box<dyn Model>> {
        match spec {
            ModelSpec::Sequential { layers } => {
                let model = self.resolve_sequential(layers)?;
                Ok(Box::new(model))
            }
        }
    }

    fn resolve_sequential(&mut self, specs: &[LayerSpec]) -> Result<Sequential> {
        let mut layers = Vec::with_capacity(specs.len());
        let mut params = Vec::new();

        for spec in specs {
            let layer = self.resolve_layer(*spec, &mut params)?;
            layers.push(layer);
        }

        Sequential::with_params(layers, params)
    }

    fn resolve_layer(&mut self, spec: LayerSpec, params: &mut Vec<f32>) -> Result<Layer> {
        match spec {
            LayerSpec::Dense { dim, act_fn, init } => {
                Self::check_dim(dim)?;
                params.extend(self.sample(init, dim.0 * dim.1)?);
                params.extend(std::iter::repeat_n(0., dim.1));
                Ok(Layer::dense(dim, act_fn.map(Into::into)))
            }
            LayerSpec::Embedding { dim, init } => {
                Self::check_dim(dim)?;
                params.extend(self.sample(init, dim.0 * dim.1)?);
                Ok(Layer::embedding(dim))
            }
        }
    }

    fn sample(&mut self, spec: ParamGenSpec, n: usize) -> Result<Vec<f32>> {
        Ok(Initializer::from_spec(spec)?.sample(&mut self.rng, n))
    }

    fn check_dim(dim: (usize, usize)) -> Result<()> {
        if dim.0 == 0 || dim.1 == 0 {
            return Err(MlErr::InvalidInit(format!("layer dimension {dim:?} has a zero")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use comms::specs::machine_learning::ActFnSpec;

    use super::*;

    fn spec() -> ModelSpec {
        ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (3, 4),
                    act_fn: Some(ActFnSpec::Tanh),
                    init: ParamGenSpec::XavierUniform {
                        fan_in: 3,
                        fan_out: 4,
                    },
                },
                LayerSpec::Dense {
                    dim: (4, 2),
                    act_fn: None,
                    init: ParamGenSpec::Const { value: 0.5 },
                },
            ],
        }
    }

    #[test]
    fn same_seed_same_model() {
        let a = ModelBuilder::new(Some(42)).build(&spec()).unwrap();
        let b = ModelBuilder::new(Some(42)).build(&spec()).unwrap();

        assert_eq!(a.params(), b.params());
        assert_eq!(a.size(), 16 + 10);
    }

    #[test]
    fn biases_start_at_zero() {
        let model = ModelBuilder::new(Some(0)).build(&spec()).unwrap();
        let weights = model.get_weights().unwrap();

        assert!(weights.tensors()[1].iter().all(|&b| b == 0.));
        assert!(weights.tensors()[2].iter().all(|&w| w == 0.5));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let spec = ModelSpec::Sequential {
            layers: vec![LayerSpec::Embedding {
                dim: (0, 8),
                init: ParamGenSpec::Const { value: 0. },
            }],
        };

        assert!(ModelBuilder::new(None).build(&spec).is_err());
    }
}
