mod training;

pub use training::{OptimizerToggles, RequestSpec, TrainingSpec};
