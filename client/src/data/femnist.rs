use std::path::Path;

use super::{
    Partition, PartitionLoader, PartitionMeta,
    partition::{RawPartition, malformed, pack},
};
use crate::error::Result;

/// Loads handwritten character partitions: flattened 28x28 images labeled with one of 62
/// classes (digits, upper and lower case letters).
#[derive(Debug, Clone, Copy)]
pub struct FemnistLoader {
    features: usize,
    classes: usize,
}

impl FemnistLoader {
    pub const FEATURES: usize = 28 * 28;
    pub const CLASSES: usize = 62;

    pub fn new(features: usize, classes: usize) -> Self {
        Self { features, classes }
    }
}

impl Default for FemnistLoader {
    fn default() -> Self {
        Self::new(Self::FEATURES, Self::CLASSES)
    }
}

impl PartitionLoader for FemnistLoader {
    fn decode(&self, path: &Path) -> Result<Partition> {
        let RawPartition {
            x,
            y,
            idx,
            character,
        } = RawPartition::<Vec<f32>, f32>::read(path)?;

        if let Some((i, label)) = y
            .iter()
            .enumerate()
            .find(|(_, l)| l.fract() != 0. || !(0. ..self.classes as f32).contains(*l))
        {
            let reason = format!("label {label} of example {i} is not a class below {}", self.classes);
            return Err(malformed(path, reason));
        }

        Ok(Partition {
            dataset: pack(path, x.into_iter().zip(y), self.features)?,
            meta: PartitionMeta { idx, character },
        })
    }
}
