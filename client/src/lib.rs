pub mod client;
pub mod data;
pub mod error;
pub mod server;
pub mod tasks;

pub use client::{Client, FitResult};
pub use error::{ClientErr, Result};
pub use tasks::{TaskProfile, TaskRegistry};
