use std::path::Path;

use super::{
    Partition, PartitionLoader, PartitionMeta,
    partition::{RawPartition, malformed, pack},
};
use crate::error::Result;

/// Loads sentiment partitions: fixed-length feature vectors labeled `0` (negative) or `1`
/// (positive).
#[derive(Debug, Clone, Copy)]
pub struct Sent140Loader {
    features: usize,
}

impl Sent140Loader {
    pub const FEATURES: usize = 300;

    pub fn new(features: usize) -> Self {
        Self { features }
    }
}

impl Default for Sent140Loader {
    fn default() -> Self {
        Self::new(Self::FEATURES)
    }
}

impl PartitionLoader for Sent140Loader {
    fn decode(&self, path: &Path) -> Result<Partition> {
        let RawPartition {
            x,
            y,
            idx,
            character,
        } = RawPartition::<Vec<f32>, f32>::read(path)?;

        if let Some((i, label)) = y.iter().enumerate().find(|(_, l)| **l != 0. && **l != 1.) {
            return Err(malformed(path, format!("label {label} of example {i} is not binary")));
        }

        Ok(Partition {
            dataset: pack(path, x.into_iter().zip(y), self.features)?,
            meta: PartitionMeta { idx, character },
        })
    }
}
