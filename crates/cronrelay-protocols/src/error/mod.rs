//! Error types for the CronRelay protocol layer.

mod handler;
mod status;
mod store;
mod validation;

pub use handler::*;
pub use status::*;
pub use store::*;
pub use validation::*;
