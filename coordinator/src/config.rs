use std::{
    fs,
    net::{SocketAddr, ToSocketAddrs},
    num::{NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use client::{Client, TaskRegistry};
use comms::specs::federated::{EvalConfig, Subset, TrainingConfig};
use futures::future;
use machine_learning::{WeightVector, arch::ModelBuilder};
use serde::Deserialize;

use crate::{
    error::{CoordinatorErr, Result},
    proxy::{ClientProxy, LocalProxy, RemoteProxy},
    round::RoundConfig,
    selection::{AllClients, ClientSelector, FixedSelection, RandomSelection},
};

const DEFAULT_MIN_FIT_FRACTION: f64 = 1.0;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// A remote client and where to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteClient {
    pub id: String,
    pub addr: String,
}

/// Where the federation's clients run.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientsConfig {
    /// Clients built inside the coordinator's process, reading partitions under `data_root`.
    Local {
        data_root: PathBuf,
        ids: Vec<String>,
        #[serde(default)]
        fit_subset: Option<Subset>,
    },
    /// Clients already listening on the network.
    Remote { clients: Vec<RemoteClient> },
}

/// How the participants of each round are picked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionConfig {
    #[default]
    All,
    Fixed {
        ids: Vec<String>,
    },
    Random {
        fraction: f64,
        #[serde(default)]
        min_clients: usize,
    },
}

/// A whole federated experiment, as read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub task: String,
    pub rounds: NonZeroUsize,
    #[serde(default = "default_min_fit_fraction")]
    pub min_fit_fraction: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: NonZeroU64,
    pub training: TrainingConfig,
    #[serde(default)]
    pub evaluation: Option<EvalConfig>,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub seed: Option<u64>,
    pub clients: ClientsConfig,
}

fn default_min_fit_fraction() -> f64 {
    DEFAULT_MIN_FIT_FRACTION
}

fn default_timeout_secs() -> NonZeroU64 {
    NonZeroU64::new(DEFAULT_TIMEOUT_SECS).unwrap_or(NonZeroU64::MIN)
}

impl ExperimentConfig {
    /// Reads and validates an experiment file.
    ///
    /// # Arguments
    /// * `path` - The JSON file to read.
    ///
    /// # Returns
    /// The experiment or `InvalidConfig` describing why it can't run.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            CoordinatorErr::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;

        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CoordinatorErr::InvalidConfig(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants serde can't express on its own.
    pub fn validate(&self) -> Result<()> {
        self.round_config().validate()?;

        let clients = match &self.clients {
            ClientsConfig::Local { ids, .. } => ids.len(),
            ClientsConfig::Remote { clients } => clients.len(),
        };
        if clients == 0 {
            return Err(CoordinatorErr::InvalidConfig(
                "the experiment has no clients".to_string(),
            ));
        }

        match self.selection {
            SelectionConfig::Random { fraction, .. } if !(0.0..=1.0).contains(&fraction) => {
                Err(CoordinatorErr::InvalidConfig(format!(
                    "the selection fraction must be within [0, 1], got {fraction}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn round_config(&self) -> RoundConfig {
        RoundConfig::new(
            self.training,
            self.min_fit_fraction,
            Duration::from_secs(self.timeout_secs.get()),
        )
    }

    pub fn selector(&self) -> Box<dyn ClientSelector> {
        match &self.selection {
            SelectionConfig::All => Box::new(AllClients),
            SelectionConfig::Fixed { ids } => Box::new(FixedSelection::new(ids.iter().cloned())),
            SelectionConfig::Random {
                fraction,
                min_clients,
            } => Box::new(RandomSelection::new(*fraction, *min_clients, self.seed)),
        }
    }

    /// Builds the task's freshly initialized model weights.
    pub fn initial_weights(&self, registry: &TaskRegistry) -> Result<WeightVector> {
        let profile = registry.resolve(&self.task)?;
        let model = ModelBuilder::new(self.seed).build(&profile.model)?;
        Ok(model.get_weights()?)
    }

    /// Builds a proxy for every client of the experiment, connecting to the remote ones.
    ///
    /// # Arguments
    /// * `registry` - The known task families, used by local clients.
    pub async fn build_proxies(
        &self,
        registry: &TaskRegistry,
    ) -> Result<Vec<Arc<dyn ClientProxy>>> {
        match &self.clients {
            ClientsConfig::Local {
                data_root,
                ids,
                fit_subset,
            } => ids
                .iter()
                .map(|id| -> Result<Arc<dyn ClientProxy>> {
                    let mut client =
                        Client::new(id.as_str(), self.task.as_str(), data_root, registry)?;
                    if let Some(subset) = fit_subset {
                        client = client.with_fit_subset(*subset);
                    }
                    if let Some(seed) = self.seed {
                        client = client.with_seed(seed);
                    }

                    Ok(Arc::new(LocalProxy::new(client)))
                })
                .collect(),
            ClientsConfig::Remote { clients } => {
                let connections = clients.iter().map(|remote| async move {
                    let addr = resolve(&remote.addr)?;
                    let proxy = RemoteProxy::connect(remote.id.as_str(), addr).await?;
                    Ok::<_, CoordinatorErr>(Arc::new(proxy) as Arc<dyn ClientProxy>)
                });

                future::try_join_all(connections).await
            }
        }
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|source| CoordinatorErr::ConnectionFailed {
            addr: addr.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| CoordinatorErr::InvalidConfig(format!("`{addr}` resolves to no address")))
}
