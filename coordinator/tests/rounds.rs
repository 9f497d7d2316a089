use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use client::FitResult;
use comms::specs::federated::{EvalConfig, EvalResult, Split, Subset, TrainingConfig};
use coordinator::{
    ClientProxy, CoordinatorErr, RoundConfig, RoundOrchestrator, RoundOutcome, RoundState,
    selection::FixedSelection,
};
use machine_learning::WeightVector;
use ndarray::{arr1, arr2};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Answers with every parameter set to `value`.
    Answer { value: f32, num_examples: usize },
    /// Fails its first `times` requests, then answers.
    Flaky { times: usize, num_examples: usize },
    /// Answers with a single tensor unlike any of the global model's.
    Reshaped { num_examples: usize },
    Fail,
    Hang,
}

struct MockProxy {
    id: String,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockProxy {
    fn new(id: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn failure(&self) -> CoordinatorErr {
        CoordinatorErr::ClientFailed {
            client_id: self.id.clone(),
            reason: "data not found".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ClientProxy for MockProxy {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fit(
        &self,
        weights: WeightVector,
        _config: TrainingConfig,
    ) -> coordinator::Result<FitResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        let (value, num_examples) = match self.behavior {
            Behavior::Answer {
                value,
                num_examples,
            } => (value, num_examples),
            Behavior::Flaky {
                times,
                num_examples,
            } if call >= times => (call as f32, num_examples),
            Behavior::Reshaped { num_examples } => {
                return Ok(FitResult {
                    weights: WeightVector::new(vec![arr1(&[1.0, 2.0, 3.0]).into_dyn()]),
                    num_examples,
                    duration: 0.0,
                    epoch_losses: Vec::new(),
                });
            }
            Behavior::Flaky { .. } | Behavior::Fail => return Err(self.failure()),
            Behavior::Hang => std::future::pending().await,
        };

        let tensors = weights.tensors().iter().map(|t| t.mapv(|_| value)).collect();
        Ok(FitResult {
            weights: WeightVector::new(tensors),
            num_examples,
            duration: 0.0,
            epoch_losses: Vec::new(),
        })
    }

    async fn evaluate(
        &self,
        _weights: WeightVector,
        _config: EvalConfig,
    ) -> coordinator::Result<EvalResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Answer {
                value,
                num_examples,
            } => Ok(EvalResult {
                loss: value,
                accuracy: 1.0 / value,
                num_examples,
            }),
            Behavior::Hang => std::future::pending().await,
            _ => Err(self.failure()),
        }
    }
}

fn initial() -> WeightVector {
    WeightVector::new(vec![
        arr2(&[[0.5, -0.5], [1.0, 0.0]]).into_dyn(),
        arr1(&[0.0, 0.0]).into_dyn(),
    ])
}

fn round_config(min_fit_fraction: f64, timeout: Duration) -> RoundConfig {
    RoundConfig::new(TrainingConfig::new(0.1, 1, 4).unwrap(), min_fit_fraction, timeout)
}

fn orchestrator(proxies: &[Arc<MockProxy>], config: RoundConfig) -> RoundOrchestrator {
    let proxies = proxies
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn ClientProxy>)
        .collect();
    RoundOrchestrator::new(initial(), proxies, config).unwrap()
}

fn answer(value: f32, num_examples: usize) -> Behavior {
    Behavior::Answer {
        value,
        num_examples,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn quorum_not_met_leaves_the_model_untouched() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 10)),
        MockProxy::new("2", Behavior::Fail),
        MockProxy::new("3", Behavior::Fail),
        MockProxy::new("4", Behavior::Fail),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(0.5, Duration::from_secs(5)));

    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorErr::QuorumNotMet {
            respondents: 1,
            required: 2,
            selected: 4
        }
    ));
    assert!(err.is_retry_eligible());

    assert_eq!(orchestrator.global().round, 0);
    assert_eq!(orchestrator.global().weights, initial());
    assert_eq!(orchestrator.state(), RoundState::Idle);

    let record = &orchestrator.history()[0];
    assert_eq!(record.outcome, RoundOutcome::QuorumNotMet);
    assert_eq!(record.respondents, vec!["1"]);
    assert_eq!(record.dropped.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_clients_are_dropped_and_the_rest_averaged() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 10)),
        MockProxy::new("2", answer(3.0, 30)),
        MockProxy::new("7", Behavior::Fail),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(0.5, Duration::from_secs(5)));

    let global = orchestrator.run_round().await.unwrap();
    assert_eq!(global.round, 1);
    assert!(global.weights.to_flat().iter().all(|w| (w - 2.5).abs() < 1e-6));
    assert_eq!(global.weights.shapes(), initial().shapes());

    let record = &orchestrator.history()[0];
    assert_eq!(record.outcome, RoundOutcome::Aggregated { num_examples: 40 });
    assert_eq!(record.dropped.len(), 1);
    assert_eq!(record.dropped[0].client_id, "7");
    assert!(record.dropped[0].reason.contains("data not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stragglers_are_dropped_when_the_round_times_out() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 5)),
        MockProxy::new("2", answer(1.0, 5)),
        MockProxy::new("3", Behavior::Hang),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(0.5, Duration::from_millis(200)));

    let global = orchestrator.run_round().await.unwrap();
    assert_eq!(global.round, 1);

    let record = &orchestrator.history()[0];
    assert_eq!(record.respondents.len(), 2);
    assert_eq!(record.dropped.len(), 1);
    assert_eq!(record.dropped[0].client_id, "3");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_round_keeps_the_model() {
    let proxies = [
        MockProxy::new("1", answer(2.0, 5)),
        MockProxy::new("2", Behavior::Hang),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(30)));

    let cancel = orchestrator.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(err, CoordinatorErr::Cancelled));
    assert!(!err.is_retry_eligible());
    assert_eq!(orchestrator.global().round, 0);
    assert_eq!(orchestrator.global().weights, initial());
    assert_eq!(orchestrator.history()[0].outcome, RoundOutcome::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_training_config_aborts_before_dispatch() {
    let proxies = [MockProxy::new("1", answer(1.0, 1))];
    let mut config = round_config(1.0, Duration::from_secs(5));
    config.training.learning_rate = f32::NAN;
    let mut orchestrator = orchestrator(&proxies, config);

    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(err, CoordinatorErr::Config(_)));
    assert_eq!(proxies[0].calls.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.global().round, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_moves_past_rounds_without_quorum() {
    let proxies = [
        MockProxy::new("1", answer(4.0, 10)),
        MockProxy::new(
            "2",
            Behavior::Flaky {
                times: 1,
                num_examples: 10,
            },
        ),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(5)));

    let global = orchestrator.run(3).await.unwrap();
    assert_eq!(global.round, 2);

    let outcomes: Vec<_> = orchestrator.history().iter().map(|r| r.outcome.clone()).collect();
    assert_eq!(outcomes[0], RoundOutcome::QuorumNotMet);
    assert_eq!(outcomes[2], RoundOutcome::Aggregated { num_examples: 20 });
    assert_eq!(orchestrator.state(), RoundState::Done);

    // The flaky client answered with 2.0 on its third call.
    let global = orchestrator.global();
    assert!(global.weights.to_flat().iter().all(|w| (w - 3.0).abs() < 1e-6));

    assert!(orchestrator.run_round().await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn evaluation_is_weighted_and_read_only() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 30)),
        MockProxy::new("2", answer(2.0, 10)),
        MockProxy::new("3", Behavior::Fail),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(5)));
    let config = EvalConfig {
        batch_size: NonZeroUsize::new(8).unwrap(),
        split: Split::Test,
        subset: Subset::Query,
    };

    let result = orchestrator.evaluate_round(config).await.unwrap();
    assert_eq!(result.num_examples, 40);
    assert!((result.loss - 1.25).abs() < 1e-6);
    assert!((result.accuracy - 0.875).abs() < 1e-6);

    assert_eq!(orchestrator.global().weights, initial());
    assert!(orchestrator.history().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn selection_limits_the_participants() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 1)),
        MockProxy::new("2", answer(5.0, 1)),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(5)))
        .with_selector(Box::new(FixedSelection::new(["2"])));

    let global = orchestrator.run_round().await.unwrap();
    assert!(global.weights.to_flat().iter().all(|&w| w == 5.0));
    assert_eq!(proxies[0].calls.load(Ordering::SeqCst), 0);

    let mut orchestrator = orchestrator.with_selector(Box::new(FixedSelection::new(["9"])));
    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(err, CoordinatorErr::InvalidConfig(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn round_without_examples_fails_to_aggregate() {
    let proxies = [
        MockProxy::new("1", answer(9.0, 0)),
        MockProxy::new("2", answer(7.0, 0)),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(5)));

    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(err, CoordinatorErr::Aggregation(_)), "{err}");
    assert!(!err.is_retry_eligible());

    assert_eq!(orchestrator.global().round, 0);
    assert_eq!(orchestrator.global().weights, initial());
    let record = &orchestrator.history()[0];
    assert!(matches!(record.outcome, RoundOutcome::Failed(_)));
    assert_eq!(record.respondents.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn reshaped_update_fails_the_round() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 10)),
        MockProxy::new("2", Behavior::Reshaped { num_examples: 10 }),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(5)));

    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(err, CoordinatorErr::WeightShapeMismatch { .. }), "{err}");

    assert_eq!(orchestrator.global().round, 0);
    assert_eq!(orchestrator.global().weights, initial());
    assert!(matches!(
        orchestrator.history()[0].outcome,
        RoundOutcome::Failed(_)
    ));
    assert_eq!(orchestrator.state(), RoundState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn selecting_a_client_twice_is_rejected() {
    let proxies = [
        MockProxy::new("1", answer(1.0, 1)),
        MockProxy::new("2", answer(5.0, 1)),
    ];
    let mut orchestrator = orchestrator(&proxies, round_config(1.0, Duration::from_secs(5)))
        .with_selector(Box::new(FixedSelection::new(["2", "2"])));

    let err = orchestrator.run_round().await.unwrap_err();
    assert!(matches!(err, CoordinatorErr::InvalidConfig(_)), "{err}");
    assert_eq!(proxies[1].calls.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.global().weights, initial());
}

#[test]
fn duplicate_client_ids_are_rejected() {
    let proxies = [
        MockProxy::new("1", Behavior::Fail),
        MockProxy::new("1", Behavior::Fail),
    ]
    .into_iter()
    .map(|p| p as Arc<dyn ClientProxy>)
    .collect();

    let config = round_config(1.0, Duration::from_secs(1));
    let err = RoundOrchestrator::new(initial(), proxies, config).err().unwrap();
    assert!(matches!(err, CoordinatorErr::InvalidConfig(_)));
}
