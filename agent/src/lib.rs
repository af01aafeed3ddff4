mod agent;
mod transfer;

pub use agent::Agent;
pub use transfer::{apply_grads, apply_params, collect_grads, collect_params};

/// The result type for every fallible agent operation.
pub type Result<T> = anyhow::Result<T>;
