use std::{collections::HashSet, sync::Arc, time::Duration};

use client::FitResult;
use comms::specs::federated::{EvalConfig, EvalResult, TrainingConfig};
use log::{info, warn};
use machine_learning::WeightVector;
use tokio::{task::JoinSet, time};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregation::{Aggregator, FedAvg},
    error::{CoordinatorErr, Result},
    proxy::ClientProxy,
    selection::{AllClients, ClientSelector},
};

const QUORUM_TOLERANCE: f64 = 1e-9;

/// Where the orchestrator stands within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Configuring,
    Dispatching,
    AwaitingResults,
    Aggregating,
    Done,
}

/// The federation's shared model and the amount of rounds it went through.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalModel {
    pub weights: WeightVector,
    pub round: usize,
}

/// How every round is run.
#[derive(Debug, Clone, Copy)]
pub struct RoundConfig {
    pub training: TrainingConfig,
    /// The least share of the selected clients that must answer for a round to aggregate.
    pub min_fit_fraction: f64,
    /// How long a round waits for its clients.
    pub timeout: Duration,
}

impl RoundConfig {
    pub fn new(training: TrainingConfig, min_fit_fraction: f64, timeout: Duration) -> Self {
        Self {
            training,
            min_fit_fraction,
            timeout,
        }
    }

    /// Checks every field.
    ///
    /// # Returns
    /// `Config` for an invalid training config, `InvalidConfig` for the rest.
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;

        if !(0.0..=1.0).contains(&self.min_fit_fraction) {
            return Err(CoordinatorErr::InvalidConfig(format!(
                "min_fit_fraction must be within [0, 1], got {}",
                self.min_fit_fraction
            )));
        }

        if self.timeout.is_zero() {
            return Err(CoordinatorErr::InvalidConfig(
                "the round timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the amount of respondents needed when `selected` clients were dispatched.
    ///
    /// Never less than one, a round without answers has nothing to aggregate.
    pub fn quorum(&self, selected: usize) -> usize {
        // Products like `0.07 * 100` land just above the integer they stand for.
        let exact = self.min_fit_fraction * selected as f64;
        let required = (exact - QUORUM_TOLERANCE).ceil().max(0.) as usize;
        required.max(1)
    }
}

/// A client left out of a round's results.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedClient {
    pub client_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Aggregated { num_examples: usize },
    QuorumNotMet,
    Cancelled,
    Failed(String),
}

/// What happened in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub round: usize,
    pub selected: Vec<String>,
    pub respondents: Vec<String>,
    pub dropped: Vec<DroppedClient>,
    pub outcome: RoundOutcome,
}

/// The answers gathered from a set of dispatched requests.
struct Gathered<T> {
    answers: Vec<(String, T)>,
    dropped: Vec<DroppedClient>,
}

/// Drives federated rounds: selects clients, hands them the global weights, collects their
/// updates and replaces the global model with the aggregate.
///
/// The global model is only ever replaced as a whole, once a round has aggregated, so no round
/// dispatches from a partially updated model.
pub struct RoundOrchestrator {
    global: GlobalModel,
    proxies: Vec<Arc<dyn ClientProxy>>,
    selector: Box<dyn ClientSelector>,
    aggregator: Box<dyn Aggregator>,
    config: RoundConfig,
    state: RoundState,
    history: Vec<RoundRecord>,
    cancel: CancellationToken,
}

impl RoundOrchestrator {
    /// Creates a new `RoundOrchestrator` selecting every client and averaging with `FedAvg`.
    ///
    /// # Arguments
    /// * `weights` - The initial global weights.
    /// * `proxies` - Every client of the federation.
    /// * `config` - How every round is run.
    ///
    /// # Returns
    /// The orchestrator or `InvalidConfig` if two proxies share an id.
    pub fn new(
        weights: WeightVector,
        proxies: Vec<Arc<dyn ClientProxy>>,
        config: RoundConfig,
    ) -> Result<Self> {
        let mut ids = HashSet::new();
        if let Some(proxy) = proxies.iter().find(|p| !ids.insert(p.id().to_string())) {
            return Err(CoordinatorErr::InvalidConfig(format!(
                "client id `{}` is registered twice",
                proxy.id()
            )));
        }

        Ok(Self {
            global: GlobalModel { weights, round: 0 },
            proxies,
            selector: Box::new(AllClients),
            aggregator: Box::new(FedAvg),
            config,
            state: RoundState::Idle,
            history: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_selector(mut self, selector: Box<dyn ClientSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Box<dyn Aggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Uses `cancel` to stop rounds instead of the orchestrator's own token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn global(&self) -> &GlobalModel {
        &self.global
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Returns a token that cancels the ongoing and every following round.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one round of federated training.
    ///
    /// Clients that fail or don't answer in time are dropped from the round. On any error the
    /// global model is left untouched.
    ///
    /// # Returns
    /// The new global model, or the reason the round failed.
    pub async fn run_round(&mut self) -> Result<&GlobalModel> {
        if self.state == RoundState::Done {
            return Err(CoordinatorErr::InvalidConfig(
                "the run already finished".to_string(),
            ));
        }

        let round = self.global.round;
        self.state = RoundState::Configuring;

        let selected = match self.config.validate().and_then(|_| self.select(round)) {
            Ok(selected) => selected,
            Err(e) => {
                let outcome = RoundOutcome::Failed(e.to_string());
                self.record(round, Vec::new(), Vec::new(), Vec::new(), outcome);
                return Err(e);
            }
        };
        let selected_ids: Vec<String> = selected.iter().map(|p| p.id().to_string()).collect();

        self.state = RoundState::Dispatching;
        info!(round = round, selected = selected.len(); "dispatching fit requests");

        let mut tasks = JoinSet::new();
        for proxy in selected {
            let weights = self.global.weights.clone();
            let config = self.config.training;
            tasks.spawn(async move {
                let id = proxy.id().to_string();
                (id, proxy.fit(weights, config).await)
            });
        }

        self.state = RoundState::AwaitingResults;
        let gathered = match self.gather(round, tasks, &selected_ids).await {
            Ok(gathered) => gathered,
            Err(e) => {
                self.record(round, selected_ids, Vec::new(), Vec::new(), RoundOutcome::Cancelled);
                return Err(e);
            }
        };

        let required = self.config.quorum(selected_ids.len());
        let respondents = gathered.answers.len();
        if respondents < required {
            warn!(
                round = round,
                respondents = respondents,
                required = required;
                "quorum not met"
            );
            let selected = selected_ids.len();
            self.finish(round, selected_ids, gathered, RoundOutcome::QuorumNotMet);
            return Err(CoordinatorErr::QuorumNotMet {
                respondents,
                required,
                selected,
            });
        }

        if self.cancel.is_cancelled() {
            self.finish(round, selected_ids, gathered, RoundOutcome::Cancelled);
            return Err(CoordinatorErr::Cancelled);
        }

        self.state = RoundState::Aggregating;
        let (respondents, fits): (Vec<String>, Vec<FitResult>) =
            gathered.answers.into_iter().unzip();
        let dropped = gathered.dropped;
        let num_examples: usize = fits.iter().map(|fit| fit.num_examples).sum();

        match self.aggregate(&fits) {
            Ok(weights) => {
                self.global = GlobalModel {
                    weights,
                    round: round + 1,
                };

                info!(
                    round = round,
                    respondents = respondents.len(),
                    examples = num_examples;
                    "round aggregated"
                );
                let outcome = RoundOutcome::Aggregated { num_examples };
                self.record(round, selected_ids, respondents, dropped, outcome);
                Ok(&self.global)
            }
            Err(e) => {
                warn!(round = round, error = e.to_string().as_str(); "aggregation failed");
                let outcome = RoundOutcome::Failed(e.to_string());
                self.record(round, selected_ids, respondents, dropped, outcome);
                Err(e)
            }
        }
    }

    /// Runs `rounds` rounds, moving on after rounds that failed to reach their quorum.
    ///
    /// # Returns
    /// The final global model or the first error that isn't worth retrying.
    pub async fn run(&mut self, rounds: usize) -> Result<&GlobalModel> {
        for _ in 0..rounds {
            match self.run_round().await {
                Ok(_) => {}
                Err(e) if e.is_retry_eligible() => {
                    warn!(error = e.to_string().as_str(); "round skipped");
                }
                Err(e) => return Err(e),
            }
        }

        self.state = RoundState::Done;
        Ok(&self.global)
    }

    /// Measures the global weights on the selected clients' data.
    ///
    /// Failing clients are left out; the global model is never modified.
    ///
    /// # Arguments
    /// * `config` - Which partition every client evaluates on.
    ///
    /// # Returns
    /// The example weighted evaluation or an `Aggregation` error if no client answered.
    pub async fn evaluate_round(&mut self, config: EvalConfig) -> Result<EvalResult> {
        let round = self.global.round;
        let selected = self.select(round)?;
        let selected_ids: Vec<String> = selected.iter().map(|p| p.id().to_string()).collect();

        let mut tasks = JoinSet::new();
        for proxy in selected {
            let weights = self.global.weights.clone();
            tasks.spawn(async move {
                let id = proxy.id().to_string();
                (id, proxy.evaluate(weights, config).await)
            });
        }

        let gathered = self.gather(round, tasks, &selected_ids).await?;
        let results: Vec<EvalResult> = gathered.answers.into_iter().map(|(_, r)| r).collect();
        let result = self.aggregator.combine_evaluations(&results)?;

        info!(
            round = round,
            respondents = results.len(),
            loss = result.loss,
            accuracy = result.accuracy;
            "round evaluated"
        );

        Ok(result)
    }

    /// Ends the session of every client.
    pub async fn disconnect(&self) -> Result<()> {
        for proxy in &self.proxies {
            proxy.disconnect().await?;
        }

        Ok(())
    }

    /// Asks the selector for this round's clients.
    ///
    /// # Returns
    /// The selected proxies, or `InvalidConfig` if the selector picked an unknown client or the
    /// same client twice.
    fn select(&mut self, round: usize) -> Result<Vec<Arc<dyn ClientProxy>>> {
        let available: Vec<&str> = self.proxies.iter().map(|p| p.id()).collect();
        let ids = self.selector.select(round, &available);

        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter()
            .map(|id| {
                if !seen.insert(id.as_str()) {
                    return Err(CoordinatorErr::InvalidConfig(format!(
                        "client `{id}` was selected twice"
                    )));
                }

                self.proxies
                    .iter()
                    .find(|p| p.id() == id)
                    .cloned()
                    .ok_or_else(|| {
                        CoordinatorErr::InvalidConfig(format!("selected unknown client `{id}`"))
                    })
            })
            .collect()
    }

    /// Waits for the dispatched requests until all of them finish or the round times out.
    ///
    /// # Returns
    /// The answers and the dropped clients, or `Cancelled`. Unfinished requests are aborted.
    async fn gather<T: Send + 'static>(
        &self,
        round: usize,
        mut tasks: JoinSet<(String, Result<T>)>,
        selected: &[String],
    ) -> Result<Gathered<T>> {
        let mut pending: HashSet<&str> = selected.iter().map(String::as_str).collect();
        let mut gathered = Gathered::empty();

        let deadline = time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    warn!(round = round; "round cancelled");
                    return Err(CoordinatorErr::Cancelled);
                }
                _ = &mut deadline => {
                    tasks.abort_all();
                    warn!(round = round, pending = pending.len(); "round timed out");
                    break;
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((id, Ok(answer)))) => {
                        pending.remove(id.as_str());
                        gathered.answers.push((id, answer));
                    }
                    Some(Ok((id, Err(e)))) => {
                        warn!(
                            round = round,
                            client_id = id.as_str(),
                            error = e.to_string().as_str();
                            "client dropped"
                        );
                        pending.remove(id.as_str());
                        gathered.dropped.push(DroppedClient {
                            client_id: id,
                            reason: e.to_string(),
                        });
                    }
                    Some(Err(e)) => {
                        warn!(round = round, error = e.to_string().as_str(); "client task failed");
                    }
                },
            }
        }

        let mut unanswered: Vec<&str> = pending.into_iter().collect();
        unanswered.sort_unstable();
        gathered
            .dropped
            .extend(unanswered.into_iter().map(|id| DroppedClient {
                client_id: id.to_string(),
                reason: "no answer before the round ended".to_string(),
            }));

        Ok(gathered)
    }

    /// Combines the fits, checking them against the global layout first.
    fn aggregate(&self, fits: &[FitResult]) -> Result<WeightVector> {
        let shapes = self.global.weights.shapes();
        for (result, fit) in fits.iter().enumerate() {
            fit.weights
                .check_shapes(&shapes)
                .map_err(|source| CoordinatorErr::WeightShapeMismatch { result, source })?;
        }

        self.aggregator.combine(fits)
    }

    fn finish<T>(
        &mut self,
        round: usize,
        selected: Vec<String>,
        gathered: Gathered<T>,
        outcome: RoundOutcome,
    ) {
        let respondents = gathered.answers.into_iter().map(|(id, _)| id).collect();
        self.record(round, selected, respondents, gathered.dropped, outcome);
    }

    fn record(
        &mut self,
        round: usize,
        selected: Vec<String>,
        respondents: Vec<String>,
        dropped: Vec<DroppedClient>,
        outcome: RoundOutcome,
    ) {
        self.history.push(RoundRecord {
            round,
            selected,
            respondents,
            dropped,
            outcome,
        });
        self.state = RoundState::Idle;
    }
}

impl<T> Gathered<T> {
    fn empty() -> Self {
        Self {
            answers: Vec::new(),
            dropped: Vec::new(),
        }
    }
}
