use std::{
    fmt::Display,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use comms::specs::federated::{Split, Subset};
use log::debug;
use machine_learning::dataset::{DataLoader, Dataset};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::{ClientErr, Result};

/// Identifies one partition file: `<root>/<task>/<split>/<client_id>/<subset>.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionId<'a> {
    pub task: &'a str,
    pub split: Split,
    pub client_id: &'a str,
    pub subset: Subset,
}

impl<'a> PartitionId<'a> {
    pub fn new(task: &'a str, split: Split, client_id: &'a str, subset: Subset) -> Self {
        Self {
            task,
            split,
            client_id,
            subset,
        }
    }

    /// Returns where this partition lives under `root`.
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(self.task)
            .join(self.split.as_str())
            .join(self.client_id)
            .join(format!("{}.json", self.subset))
    }
}

/// Per-partition bookkeeping carried along the examples but never trained on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionMeta {
    pub idx: Option<serde_json::Value>,
    pub character: Option<String>,
}

/// A decoded partition.
#[derive(Debug, Clone)]
pub struct Partition {
    pub dataset: Dataset,
    pub meta: PartitionMeta,
}

impl Partition {
    /// Returns the amount of examples left after decoding.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

/// Turns partition files of one task family into batched examples.
pub trait PartitionLoader: Send + Sync {
    /// Reads and decodes the partition file at `path`.
    ///
    /// # Returns
    /// The partition, `DataNotFound` if there's no file or `MalformedPartition` if it can't be
    /// decoded.
    fn decode(&self, path: &Path) -> Result<Partition>;

    /// Loads a partition as a batched sequence of examples.
    ///
    /// # Arguments
    /// * `root` - The directory holding every task's partitions.
    /// * `id` - Which partition to load.
    /// * `batch_size` - The maximum amount of examples per batch.
    /// * `shuffle` - Whether to permute the examples on every pass.
    /// * `seed` - The shuffling seed, a random one is used if absent.
    ///
    /// # Returns
    /// The restartable batch sequence and the amount of examples in it.
    fn load(
        &self,
        root: &Path,
        id: &PartitionId<'_>,
        batch_size: NonZeroUsize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Result<(DataLoader<StdRng>, usize)> {
        let partition = self.decode(&id.path(root))?;
        let count = partition.len();

        debug!(
            task = id.task,
            client_id = id.client_id,
            split = id.split.as_str(),
            subset = id.subset.as_str(),
            examples = count;
            "partition loaded"
        );

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok((
            DataLoader::new(partition.dataset, batch_size, shuffle, rng),
            count,
        ))
    }
}

/// The on-disk layout shared by every task family, `x` and `y` vary in type.
#[derive(Deserialize)]
pub(super) struct RawPartition<X, Y> {
    pub x: Vec<X>,
    pub y: Vec<Y>,
    #[serde(default)]
    pub idx: Option<serde_json::Value>,
    #[serde(default)]
    pub character: Option<String>,
}

impl<X: DeserializeOwned, Y: DeserializeOwned> RawPartition<X, Y> {
    pub(super) fn read(path: &Path) -> Result<Self> {
        // Whatever keeps the file from being read, only this request is affected.
        let bytes = fs::read(path).map_err(|e| {
            debug!("partition {} unreadable: {e}", path.display());
            ClientErr::DataNotFound {
                path: path.to_path_buf(),
            }
        })?;

        let raw: Self = serde_json::from_slice(&bytes).map_err(|e| malformed(path, e))?;
        if raw.x.len() != raw.y.len() {
            let reason = format!("{} inputs but {} labels", raw.x.len(), raw.y.len());
            return Err(malformed(path, reason));
        }

        Ok(raw)
    }
}

pub(super) fn malformed(path: &Path, reason: impl Display) -> ClientErr {
    ClientErr::MalformedPartition {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Packs feature rows, each followed by its label, into a dataset.
///
/// # Returns
/// The dataset or `MalformedPartition` if a row doesn't have exactly `features` values.
pub(super) fn pack<I>(path: &Path, rows: I, features: usize) -> Result<Dataset>
where
    I: IntoIterator<Item = (Vec<f32>, f32)>,
{
    let mut data = Vec::new();

    for (i, (x, y)) in rows.into_iter().enumerate() {
        if x.len() != features {
            let reason = format!("example {i} has {} features, expected {features}", x.len());
            return Err(malformed(path, reason));
        }

        data.extend(x);
        data.push(y);
    }

    Ok(Dataset::from_rows(&data, features, 1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_follows_the_storage_layout() {
        let id = PartitionId::new("femnist", Split::Val, "12", Subset::Query);

        assert_eq!(
            id.path(Path::new("/data")),
            PathBuf::from("/data/femnist/val/12/query.json")
        );
    }

    #[test]
    fn pack_rejects_ragged_rows() {
        let rows = vec![(vec![1.0, 2.0], 0.0), (vec![1.0], 1.0)];
        let err = pack(Path::new("p.json"), rows, 2).unwrap_err();

        assert!(matches!(err, ClientErr::MalformedPartition { .. }));
    }
}
