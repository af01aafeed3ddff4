pub mod cluster;
pub mod demo;
pub mod launch;

pub use cluster::run_local;
