mod adam;
mod optimizer;
mod sgd;

pub use adam::Adam;
pub use optimizer::{Optim, Optimizer};
pub use sgd::Sgd;
