use comms::specs::machine_learning::ActFnSpec;

/// An element-wise activation function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    /// The logistic function scaled to `(0, amp)`.
    Sigmoid { amp: f32 },
    Relu,
    Tanh,
}

fn logistic(z: f32) -> f32 {
    if z >= 0. {
        1. / (1. + (-z).exp())
    } else {
        let e = z.exp();
        e / (1. + e)
    }
}

impl ActFn {
    pub fn apply(&self, z: f32) -> f32 {
        match *self {
            Self::Sigmoid { amp } => amp * logistic(z),
            Self::Relu => z.max(0.),
            Self::Tanh => z.tanh(),
        }
    }

    /// The derivative at the pre-activation `z`.
    pub fn derivative(&self, z: f32) -> f32 {
        match *self {
            Self::Sigmoid { amp } => {
                let s = logistic(z);
                amp * s * (1. - s)
            }
            Self::Relu => f32::from(z > 0.),
            Self::Tanh => 1. - z.tanh().powi(2),
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Sigmoid { amp } => Self::Sigmoid { amp },
            ActFnSpec::Relu => Self::Relu,
            ActFnSpec::Tanh => Self::Tanh,
        }
    }
}
