use std::num::NonZeroU64;

use comms::specs::{RequestSpec, TrainingSpec};

/// Immutable settings for a worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// The worker index, also the coordinator's key for the reply channel.
    pub index: usize,
    /// Local steps between train, upload and sync rounds.
    pub local_update: NonZeroU64,
    /// Reply wait policy.
    pub request: RequestSpec,
}

impl WorkerConfig {
    /// Creates a new worker configuration.
    ///
    /// # Args
    /// * `index` - The index of this worker.
    /// * `local_update` - Local steps between rounds.
    /// * `request` - The reply wait policy.
    ///
    /// # Returns
    /// A `WorkerConfig` instance.
    pub fn new(index: usize, local_update: NonZeroU64, request: RequestSpec) -> Self {
        Self {
            index,
            local_update,
            request,
        }
    }

    /// Extracts the worker side settings of a training spec.
    pub fn from_spec(index: usize, spec: &TrainingSpec) -> Self {
        Self::new(index, spec.local_update, spec.request)
    }
}
