use serde::{Deserialize, Serialize};

/// An activation function applied after a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Relu,
    Tanh,
}

/// How a parameter tensor is initialized, the amount of values is always the size of the
/// tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenSpec {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    XavierUniform { fan_in: usize, fan_out: usize },
    LecunUniform { fan_in: usize },
    Normal { mean: f32, std_dev: f32 },
    Kaiming { fan_in: usize },
}

/// One layer of a model, with the initialization of its weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
        init: ParamGenSpec,
    },
    Embedding {
        /// `(vocabulary size, embedding size)`.
        dim: (usize, usize),
        init: ParamGenSpec,
    },
}

/// The architecture of a task's model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

/// The optimizer a client trains with, the learning rate arrives with each round's training
/// configuration instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent,
    GradientDescentWithMomentum {
        momentum: f32,
    },
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        Self::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// The loss a task minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    CrossEntropy,
    BinaryCrossEntropy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_task_losses_are_known() {
        let losses: Vec<LossFnSpec> =
            serde_json::from_str(r#"["cross_entropy", "binary_cross_entropy"]"#).unwrap();
        assert_eq!(
            losses,
            vec![LossFnSpec::CrossEntropy, LossFnSpec::BinaryCrossEntropy]
        );

        assert!(serde_json::from_str::<LossFnSpec>(r#""mse""#).is_err());
    }
}
