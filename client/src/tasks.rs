use std::{collections::HashMap, fmt, sync::Arc};

use comms::specs::machine_learning::{
    ActFnSpec, LayerSpec, LossFnSpec, ModelSpec, OptimizerSpec, ParamGenSpec,
};
use machine_learning::training::AccuracyRule;

use crate::{
    data::{
        FemnistLoader, LABEL_CHARACTERS, LEAF_CHARACTERS, PartitionLoader, Sent140Loader,
        ShakespeareLoader,
    },
    error::{ClientErr, Result},
};

pub const FEMNIST: &str = "femnist";
pub const SHAKESPEARE: &str = "shakespeare";
pub const SENT140: &str = "sent140";

/// Everything a client needs to know about a task family.
#[derive(Clone)]
pub struct TaskProfile {
    pub loader: Arc<dyn PartitionLoader>,
    pub loss: LossFnSpec,
    pub accuracy: AccuracyRule,
    pub model: ModelSpec,
    pub optimizer: OptimizerSpec,
}

impl fmt::Debug for TaskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskProfile")
            .field("loss", &self.loss)
            .field("accuracy", &self.accuracy)
            .field("model", &self.model)
            .field("optimizer", &self.optimizer)
            .finish_non_exhaustive()
    }
}

/// Maps task names to their profiles.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskProfile>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry knowing the `femnist`, `shakespeare` and `sent140` task families.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FEMNIST, femnist());
        registry.register(SHAKESPEARE, shakespeare());
        registry.register(SENT140, sent140());
        registry
    }

    /// Adds a task, replacing any previous profile under the same name.
    pub fn register(&mut self, name: impl Into<String>, profile: TaskProfile) {
        self.tasks.insert(name.into(), profile);
    }

    /// Looks a task up.
    ///
    /// # Returns
    /// A copy of the task's profile or `UnknownTask`.
    pub fn resolve(&self, name: &str) -> Result<TaskProfile> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| ClientErr::UnknownTask(name.to_string()))
    }
}

fn dense(dim: (usize, usize), act_fn: Option<ActFnSpec>) -> LayerSpec {
    LayerSpec::Dense {
        dim,
        act_fn,
        init: ParamGenSpec::XavierUniform {
            fan_in: dim.0,
            fan_out: dim.1,
        },
    }
}

fn femnist() -> TaskProfile {
    let (features, classes) = (FemnistLoader::FEATURES, FemnistLoader::CLASSES);

    TaskProfile {
        loader: Arc::new(FemnistLoader::default()),
        loss: LossFnSpec::CrossEntropy,
        accuracy: AccuracyRule::ArgMax,
        model: ModelSpec::Sequential {
            layers: vec![
                dense((features, 128), Some(ActFnSpec::Relu)),
                dense((128, classes), None),
            ],
        },
        optimizer: OptimizerSpec::default(),
    }
}

fn shakespeare() -> TaskProfile {
    const EMBEDDING: usize = 8;
    let vocab = LEAF_CHARACTERS.chars().count();
    let labels = LABEL_CHARACTERS.chars().count();
    let seq_len = ShakespeareLoader::SEQ_LEN;

    TaskProfile {
        loader: Arc::new(ShakespeareLoader::default()),
        loss: LossFnSpec::CrossEntropy,
        accuracy: AccuracyRule::ArgMax,
        model: ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Embedding {
                    dim: (vocab, EMBEDDING),
                    init: ParamGenSpec::Normal {
                        mean: 0.,
                        std_dev: 1.,
                    },
                },
                dense((seq_len * EMBEDDING, 256), Some(ActFnSpec::Tanh)),
                dense((256, labels), None),
            ],
        },
        optimizer: OptimizerSpec::default(),
    }
}

fn sent140() -> TaskProfile {
    TaskProfile {
        loader: Arc::new(Sent140Loader::default()),
        loss: LossFnSpec::BinaryCrossEntropy,
        accuracy: AccuracyRule::Rounded,
        model: ModelSpec::Sequential {
            layers: vec![
                dense((Sent140Loader::FEATURES, 64), Some(ActFnSpec::Relu)),
                dense((64, 1), Some(ActFnSpec::Sigmoid { amp: 1. })),
            ],
        },
        optimizer: OptimizerSpec::default(),
    }
}
