use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom};

/// Picks the clients taking part in a round.
pub trait ClientSelector: Send + Sync {
    /// Selects the participants of `round`.
    ///
    /// # Arguments
    /// * `round` - The number of the round about to start.
    /// * `available` - The ids of every registered client.
    ///
    /// # Returns
    /// The ids of the selected clients.
    fn select(&mut self, round: usize, available: &[&str]) -> Vec<String>;
}

/// Every registered client takes part in every round.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllClients;

impl ClientSelector for AllClients {
    fn select(&mut self, _round: usize, available: &[&str]) -> Vec<String> {
        available.iter().map(|id| id.to_string()).collect()
    }
}

/// The same given list of clients takes part in every round.
#[derive(Debug, Clone)]
pub struct FixedSelection {
    ids: Vec<String>,
}

impl FixedSelection {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl ClientSelector for FixedSelection {
    fn select(&mut self, _round: usize, _available: &[&str]) -> Vec<String> {
        self.ids.clone()
    }
}

/// A uniformly random fraction of the clients takes part in each round.
#[derive(Debug, Clone)]
pub struct RandomSelection {
    fraction: f64,
    min_clients: usize,
    rng: StdRng,
}

impl RandomSelection {
    /// Creates a new `RandomSelection`.
    ///
    /// # Arguments
    /// * `fraction` - The share of the available clients to select, clamped to `[0, 1]`.
    /// * `min_clients` - The least amount of clients to select, when that many are available.
    /// * `seed` - Equal seeds yield equal selections.
    pub fn new(fraction: f64, min_clients: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            fraction: fraction.clamp(0.0, 1.0),
            min_clients,
            rng,
        }
    }
}

impl ClientSelector for RandomSelection {
    fn select(&mut self, _round: usize, available: &[&str]) -> Vec<String> {
        let wanted = (self.fraction * available.len() as f64).ceil() as usize;
        let amount = wanted.max(self.min_clients).min(available.len());

        available
            .choose_multiple(&mut self.rng, amount)
            .map(|id| id.to_string())
            .collect()
    }
}
