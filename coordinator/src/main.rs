use std::{env, io};

use client::TaskRegistry;
use coordinator::{ExperimentConfig, RoundOrchestrator};
use log::{info, warn};
use tokio::signal;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "usage: coordinator <experiment.json>",
        )
    })?;

    let config = ExperimentConfig::from_path(&path)?;
    let registry = TaskRegistry::with_builtin();

    let weights = config.initial_weights(&registry)?;
    let proxies = config.build_proxies(&registry).await?;
    info!(
        "running {} round(s) of {} over {} client(s)",
        config.rounds,
        config.task,
        proxies.len()
    );

    let mut orchestrator = RoundOrchestrator::new(weights, proxies, config.round_config())?
        .with_selector(config.selector());

    let cancel = orchestrator.cancellation();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("received SIGINT, cancelling the ongoing round");
            cancel.cancel();
        }
    });

    let global = orchestrator.run(config.rounds.get()).await?;
    info!(round = global.round, params = global.weights.num_params(); "training finished");

    for record in orchestrator.history() {
        info!(
            round = record.round,
            respondents = record.respondents.len(),
            dropped = record.dropped.len();
            "{:?}",
            record.outcome
        );
    }

    if let Some(eval) = config.evaluation {
        let result = orchestrator.evaluate_round(eval).await?;
        info!(
            loss = result.loss,
            accuracy = result.accuracy,
            examples = result.num_examples;
            "global model evaluated"
        );
    }

    orchestrator.disconnect().await?;
    info!("wrapping up, disconnecting...");
    Ok(())
}
