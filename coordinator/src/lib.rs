pub mod aggregation;
pub mod config;
pub mod error;
pub mod proxy;
pub mod round;
pub mod selection;

pub use aggregation::{Aggregator, FedAvg};
pub use config::ExperimentConfig;
pub use error::{CoordinatorErr, Result};
pub use proxy::{ClientProxy, LocalProxy, RemoteProxy};
pub use round::{GlobalModel, RoundConfig, RoundOrchestrator, RoundOutcome, RoundState};
