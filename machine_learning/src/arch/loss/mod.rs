mod binary_cross_entropy;
mod cross_entropy;
mod loss_fn;

pub use binary_cross_entropy::BinaryCrossEntropy;
pub use cross_entropy::CrossEntropy;
pub use loss_fn::{Loss, LossFn};
