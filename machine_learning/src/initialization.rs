use comms::specs::machine_learning::ParamGenSpec;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::{MlErr, Result};

/// Draws the initial values of a parameter tensor.
#[derive(Debug, Clone, Copy)]
pub enum Initializer {
    Const(f32),
    Uniform(Uniform<f32>),
    Normal(Normal<f32>),
}

impl Initializer {
    /// Resolves an initialization spec.
    ///
    /// Xavier and LeCun initializations are uniform over `±sqrt(6 / (fan_in + fan_out))` and
    /// `±sqrt(3 / fan_in)`; Kaiming is normal with a standard deviation of `sqrt(2 / fan_in)`.
    ///
    /// # Returns
    /// The initializer or `InvalidInit` if the spec describes an invalid distribution.
    pub fn from_spec(spec: ParamGenSpec) -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| MlErr::InvalidInit(format!("{spec:?}: {e}"));
        let symmetric = |range: f32| Uniform::new(-range, range).map_err(|e| invalid(&e));

        let initializer = match spec {
            ParamGenSpec::Const { value } => Self::Const(value),
            ParamGenSpec::Uniform { low, high } => {
                Self::Uniform(Uniform::new(low, high).map_err(|e| invalid(&e))?)
            }
            ParamGenSpec::XavierUniform { fan_in, fan_out } => {
                Self::Uniform(symmetric((6. / (fan_in + fan_out) as f32).sqrt())?)
            }
            ParamGenSpec::LecunUniform { fan_in } => {
                Self::Uniform(symmetric((3. / fan_in as f32).sqrt())?)
            }
            ParamGenSpec::Normal { mean, std_dev } => {
                Self::Normal(Normal::new(mean, std_dev).map_err(|e| invalid(&e))?)
            }
            ParamGenSpec::Kaiming { fan_in } => {
                let std_dev = (2. / fan_in as f32).sqrt();
                Self::Normal(Normal::new(0., std_dev).map_err(|e| invalid(&e))?)
            }
        };

        Ok(initializer)
    }

    /// Draws `n` values.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f32> {
        match self {
            Self::Const(value) => vec![*value; n],
            Self::Uniform(uniform) => uniform.sample_iter(rng).take(n).collect(),
            Self::Normal(normal) => normal.sample_iter(rng).take(n).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn samples_have_the_requested_length() {
        let mut rng = StdRng::seed_from_u64(0);
        let init = Initializer::from_spec(ParamGenSpec::LecunUniform { fan_in: 4 }).unwrap();

        assert_eq!(init.sample(&mut rng, 5).len(), 5);
        assert!(init.sample(&mut rng, 0).is_empty());
    }

    #[test]
    fn xavier_samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let spec = ParamGenSpec::XavierUniform {
            fan_in: 3,
            fan_out: 3,
        };

        let samples = Initializer::from_spec(spec).unwrap().sample(&mut rng, 100);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn same_seed_same_samples() {
        let init = Initializer::from_spec(ParamGenSpec::Kaiming { fan_in: 8 }).unwrap();

        let a = init.sample(&mut StdRng::seed_from_u64(9), 16);
        let b = init.sample(&mut StdRng::seed_from_u64(9), 16);
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_distributions_are_reported() {
        let spec = ParamGenSpec::Uniform {
            low: 1.0,
            high: 0.0,
        };
        assert!(matches!(
            Initializer::from_spec(spec),
            Err(MlErr::InvalidInit(_))
        ));

        let spec = ParamGenSpec::Normal {
            mean: 0.0,
            std_dev: f32::NAN,
        };
        assert!(Initializer::from_spec(spec).is_err());
    }
}
