mod femnist;
mod partition;
mod sent140;
mod shakespeare;

pub use femnist::FemnistLoader;
pub use partition::{Partition, PartitionId, PartitionLoader, PartitionMeta};
pub use sent140::Sent140Loader;
pub use shakespeare::{LABEL_CHARACTERS, LEAF_CHARACTERS, ShakespeareLoader};
