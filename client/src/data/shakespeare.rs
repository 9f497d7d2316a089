use std::path::Path;

use super::{
    Partition, PartitionLoader, PartitionMeta,
    partition::{RawPartition, malformed, pack},
};
use crate::error::Result;

/// Every character an input line may hold, inputs are encoded as indices into it.
pub const LEAF_CHARACTERS: &str =
    "\n !\"&'(),-.0123456789:;>?ABCDEFGHIJKLMNOPQRSTUVWXYZ[]abcdefghijklmnopqrstuvwxyz}";

/// Every character a label may be, labels are encoded as indices into it.
pub const LABEL_CHARACTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz ";

/// Loads next-character prediction partitions: lines of play text labeled with the character
/// that follows them.
///
/// Examples whose label isn't in `LABEL_CHARACTERS` are dropped, an input character outside
/// `LEAF_CHARACTERS` makes the whole partition malformed.
#[derive(Debug, Clone, Copy)]
pub struct ShakespeareLoader {
    seq_len: usize,
}

impl ShakespeareLoader {
    pub const SEQ_LEN: usize = 80;

    pub fn new(seq_len: usize) -> Self {
        Self { seq_len }
    }

    fn encode_label(label: &str) -> Option<f32> {
        let mut chars = label.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };

        LABEL_CHARACTERS
            .chars()
            .position(|l| l == c)
            .map(|i| i as f32)
    }

    fn encode_line(line: &str) -> std::result::Result<Vec<f32>, char> {
        line.chars()
            .map(|c| {
                LEAF_CHARACTERS
                    .chars()
                    .position(|l| l == c)
                    .map(|i| i as f32)
                    .ok_or(c)
            })
            .collect()
    }
}

impl Default for ShakespeareLoader {
    fn default() -> Self {
        Self::new(Self::SEQ_LEN)
    }
}

impl PartitionLoader for ShakespeareLoader {
    fn decode(&self, path: &Path) -> Result<Partition> {
        let RawPartition {
            x,
            y,
            idx,
            character,
        } = RawPartition::<String, String>::read(path)?;

        let mut rows = Vec::with_capacity(x.len());
        for (i, (line, label)) in x.iter().zip(&y).enumerate() {
            let Some(label) = Self::encode_label(label) else {
                continue;
            };

            let line = Self::encode_line(line).map_err(|c| {
                malformed(path, format!("example {i} holds the unknown character {c:?}"))
            })?;

            rows.push((line, label));
        }

        Ok(Partition {
            dataset: pack(path, rows, self.seq_len)?,
            meta: PartitionMeta { idx, character },
        })
    }
}
