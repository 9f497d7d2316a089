mod accuracy;
mod local_evaluator;
mod local_trainer;

pub use accuracy::AccuracyRule;
pub use local_evaluator::LocalEvaluator;
pub use local_trainer::{LocalTrainer, TrainOutput};
