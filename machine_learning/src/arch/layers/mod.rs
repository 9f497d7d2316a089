mod dense;
mod embedding;
mod layer;

pub use dense::Dense;
pub use embedding::Embedding;
pub use layer::Layer;
