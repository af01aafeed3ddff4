use std::num::NonZeroU64;

/// Defines when a worker trains, uploads its gradients and syncs.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub local_update: NonZeroU64,
}

impl Schedule {
    pub fn new(local_update: NonZeroU64) -> Self {
        Self { local_update }
    }

    /// Returns true if the episode's `local_step` closes a local update window.
    ///
    /// Steps are counted from 1, the counter is bumped before asking.
    #[inline]
    pub fn should_sync(&self, local_step: u64) -> bool {
        local_step % self.local_update.get() == 0
    }
}
