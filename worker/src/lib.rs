pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod schedule;
pub mod worker;

pub use client::CoordinatorClient;
pub use config::WorkerConfig;
pub use error::{Result, WorkerErr};
pub use metrics::WorkerMetrics;
pub use schedule::Schedule;
pub use worker::Worker;
