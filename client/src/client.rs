use std::{path::PathBuf, time::Instant};

use comms::specs::federated::{EvalConfig, EvalResult, Split, Subset, TrainingConfig};
use log::info;
use machine_learning::{
    WeightVector,
    arch::{Model, ModelBuilder, loss::Loss},
    optimization::Optim,
    training::{LocalEvaluator, LocalTrainer},
};

use crate::{
    data::PartitionId,
    error::Result,
    tasks::{TaskProfile, TaskRegistry},
};

/// What a client hands back after local training.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub weights: WeightVector,
    pub num_examples: usize,
    /// Wall-clock seconds spent in `fit`.
    pub duration: f64,
    pub epoch_losses: Vec<f32>,
}

/// A federation participant bound to one task and one client id.
///
/// Every request starts from the weights it carries: the client keeps no model between
/// requests and reads its partitions from disk each time.
#[derive(Debug, Clone)]
pub struct Client {
    id: String,
    task: String,
    data_root: PathBuf,
    profile: TaskProfile,
    fit_subset: Subset,
    seed: Option<u64>,
}

impl Client {
    /// Creates a new `Client`.
    ///
    /// # Arguments
    /// * `id` - The client id, also the name of its partition directories.
    /// * `task` - The task family, resolved once against `registry`.
    /// * `data_root` - The directory holding every task's partitions.
    /// * `registry` - The known task families.
    ///
    /// # Returns
    /// The client or `UnknownTask`.
    pub fn new(
        id: impl Into<String>,
        task: impl Into<String>,
        data_root: impl Into<PathBuf>,
        registry: &TaskRegistry,
    ) -> Result<Self> {
        let task = task.into();
        let profile = registry.resolve(&task)?;

        Ok(Self {
            id: id.into(),
            task,
            data_root: data_root.into(),
            profile,
            fit_subset: Subset::Support,
            seed: None,
        })
    }

    /// Sets the half of the training partition `fit` reads, `Support` by default.
    pub fn with_fit_subset(mut self, subset: Subset) -> Self {
        self.fit_subset = subset;
        self
    }

    /// Makes shuffling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }


    /// Builds a freshly initialized model for this client's task.
    ///
    /// # Arguments
    /// * `seed` - Equal seeds yield equal models.
    pub fn initial_weights(&self, seed: Option<u64>) -> Result<WeightVector> {
        let model = ModelBuilder::new(seed).build(&self.profile.model)?;
        Ok(model.get_weights()?)
    }

    /// Trains the received weights on this client's training partition.
    ///
    /// # Arguments
    /// * `weights` - The global weights.
    /// * `config` - The round's hyperparameters.
    ///
    /// # Returns
    /// The locally trained weights and the amount of examples they were trained on.
    pub fn fit(&self, weights: &WeightVector, config: &TrainingConfig) -> Result<FitResult> {
        let start = Instant::now();
        config.validate()?;

        let id = PartitionId::new(&self.task, Split::Train, &self.id, self.fit_subset);
        let (mut loader, num_examples) = self.profile.loader.load(
            &self.data_root,
            &id,
            config.batch_size,
            true,
            self.seed,
        )?;

        let mut model = self.model_with(weights)?;
        let optimizer = Optim::from_spec(self.profile.optimizer, config.learning_rate, model.size());
        let loss = Loss::from_spec(self.profile.loss);
        let mut trainer = LocalTrainer::new(optimizer, loss, config.epochs);

        let output = trainer.train(model.as_mut(), &mut loader)?;
        let duration = start.elapsed().as_secs_f64();

        info!(
            client_id = self.id.as_str(),
            examples = num_examples,
            epochs = config.epochs.get(),
            duration = duration;
            "fit finished"
        );

        Ok(FitResult {
            weights: output.weights,
            num_examples,
            duration,
            epoch_losses: output.epoch_losses,
        })
    }

    /// Measures the received weights on one of this client's partitions.
    ///
    /// # Arguments
    /// * `weights` - The weights to measure, they are not modified.
    /// * `config` - Which partition to read and how to batch it.
    pub fn evaluate(&self, weights: &WeightVector, config: &EvalConfig) -> Result<EvalResult> {
        let id = PartitionId::new(&self.task, config.split, &self.id, config.subset);
        let (mut loader, _) = self.profile.loader.load(
            &self.data_root,
            &id,
            config.batch_size,
            false,
            self.seed,
        )?;

        let mut model = self.model_with(weights)?;
        let evaluator = LocalEvaluator::new(Loss::from_spec(self.profile.loss), self.profile.accuracy);
        let result = evaluator.evaluate(model.as_mut(), loader.epoch())?;

        info!(
            client_id = self.id.as_str(),
            examples = result.num_examples,
            loss = result.loss,
            accuracy = result.accuracy;
            "evaluation finished"
        );

        Ok(result)
    }

    fn model_with(&self, weights: &WeightVector) -> Result<Box<dyn Model>> {
        let mut model = ModelBuilder::new(Some(0)).build(&self.profile.model)?;
        model.set_weights(weights)?;
        Ok(model)
    }
}
