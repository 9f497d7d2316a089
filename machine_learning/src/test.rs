#![cfg(test)]

use std::num::NonZeroUsize;

use comms::specs::machine_learning::{
    ActFnSpec, LayerSpec, LossFnSpec, ModelSpec, OptimizerSpec, ParamGenSpec,
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    arch::{ModelBuilder, loss::Loss},
    dataset::{DataLoader, Dataset},
    optimization::Optim,
    training::{AccuracyRule, LocalEvaluator, LocalTrainer},
};

fn loader(rows: &[f32], x_size: usize, batch_size: usize) -> DataLoader<StdRng> {
    let dataset = Dataset::from_rows(rows, x_size, 1).unwrap();
    DataLoader::new(
        dataset,
        NonZeroUsize::new(batch_size).unwrap(),
        true,
        StdRng::seed_from_u64(5),
    )
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

#[test]
fn test_ml_and2_gate_convergence() {
    let and2 = [
        0.0, 0.0, 0.0, // 0
        0.0, 1.0, 0.0, // 0
        1.0, 0.0, 0.0, // 0
        1.0, 1.0, 1.0, // 1
    ];

    let spec = ModelSpec::Sequential {
        layers: vec![dense((2, 1), Some(ActFnSpec::Sigmoid { amp: 1.0 }))],
    };
    let mut model = ModelBuilder::new(Some(0)).build(&spec).unwrap();

    let loss = Loss::from_spec(LossFnSpec::BinaryCrossEntropy);
    let optimizer = Optim::from_spec(OptimizerSpec::default(), 0.1, model.size());
    let mut trainer = LocalTrainer::new(optimizer, loss, NonZeroUsize::new(500).unwrap());

    let mut train = loader(&and2, 2, 4);
    let output = trainer.train(model.as_mut(), &mut train).unwrap();

    assert_eq!(output.epoch_losses.len(), 500);
    assert!(output.epoch_losses[499] < output.epoch_losses[0]);

    let evaluator = LocalEvaluator::new(loss, AccuracyRule::Rounded);
    let result = evaluator.evaluate(model.as_mut(), train.epoch()).unwrap();

    assert_eq!(result.num_examples, 4);
    assert_eq!(result.accuracy, 1.0);
}

#[test]
fn test_ml_xor2_gate_loss_decreases() {
    let xor2 = [
        0.0, 0.0, 0.0, // 0
        0.0, 1.0, 1.0, // 1
        1.0, 0.0, 1.0, // 1
        1.0, 1.0, 0.0, // 0
    ];

    let spec = ModelSpec::Sequential {
        layers: vec![dense((2, 8), Some(ActFnSpec::Tanh)), dense((8, 2), None)],
    };
    let mut model = ModelBuilder::new(Some(7)).build(&spec).unwrap();

    let loss = Loss::from_spec(LossFnSpec::CrossEntropy);
    let optimizer = Optim::from_spec(OptimizerSpec::default(), 0.05, model.size());
    let mut trainer = LocalTrainer::new(optimizer, loss, NonZeroUsize::new(1000).unwrap());

    let mut train = loader(&xor2, 2, 2);
    let output = trainer.train(model.as_mut(), &mut train).unwrap();

    let first = output.epoch_losses[0];
    let last = output.epoch_losses[output.epoch_losses.len() - 1];
    assert!(last < first / 2.0, "loss went from {first} to {last}");
    assert_eq!(output.weights, model.get_weights().unwrap());
}

#[test]
fn evaluation_is_repeatable_and_read_only() {
    let spec = ModelSpec::Sequential {
        layers: vec![dense((3, 4), Some(ActFnSpec::Relu)), dense((4, 3), None)],
    };
    let mut model = ModelBuilder::new(Some(3)).build(&spec).unwrap();
    let before = model.get_weights().unwrap();

    let rows: Vec<f32> = (0..40)
        .flat_map(|i| {
            let i = i as f32;
            [i / 40.0, (i * 0.3).sin(), 1.0 - i / 40.0, (i as usize % 3) as f32]
        })
        .collect();

    let evaluator = LocalEvaluator::new(
        Loss::from_spec(LossFnSpec::CrossEntropy),
        AccuracyRule::ArgMax,
    );
    let mut data = loader(&rows, 3, 7);

    let first = evaluator.evaluate(model.as_mut(), data.epoch()).unwrap();
    let second = evaluator.evaluate(model.as_mut(), data.epoch()).unwrap();

    assert_eq!(first.num_examples, 40);
    assert!((0.0..=1.0).contains(&first.accuracy));
    assert!((first.loss - second.loss).abs() < 1e-5);
    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(model.get_weights().unwrap(), before);
}

#[test]
fn empty_evaluation_yields_zeros() {
    let spec = ModelSpec::Sequential {
        layers: vec![dense((2, 2), None)],
    };
    let mut model = ModelBuilder::new(Some(0)).build(&spec).unwrap();

    let dataset = Dataset::new(Array2::zeros((0, 2)), Array2::zeros((0, 1))).unwrap();
    let evaluator = LocalEvaluator::new(
        Loss::from_spec(LossFnSpec::CrossEntropy),
        AccuracyRule::ArgMax,
    );

    let result = evaluator
        .evaluate(model.as_mut(), dataset.batches(NonZeroUsize::new(4).unwrap()))
        .unwrap();

    assert_eq!(result.loss, 0.0);
    assert_eq!(result.accuracy, 0.0);
    assert_eq!(result.num_examples, 0);
}
