use std::num::NonZeroU64;

use comms::specs::TrainingSpec;

/// Global step intervals that trigger coordinator side work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub target_refresh: NonZeroU64,
    pub checkpoint: NonZeroU64,
}

impl Cadence {
    pub fn new(target_refresh: NonZeroU64, checkpoint: NonZeroU64) -> Self {
        Self {
            target_refresh,
            checkpoint,
        }
    }

    pub fn from_spec(spec: &TrainingSpec) -> Self {
        Self::new(spec.target_refresh, spec.checkpoint)
    }

    /// Whether the target networks are refreshed once the counter reaches `step`.
    #[inline]
    pub fn should_refresh(&self, step: u64) -> bool {
        step % self.target_refresh.get() == 0
    }

    /// Whether a checkpoint is taken once the counter reaches `step`.
    #[inline]
    pub fn should_checkpoint(&self, step: u64) -> bool {
        step % self.checkpoint.get() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_are_independent() {
        let cadence = Cadence::new(NonZeroU64::new(100).unwrap(), NonZeroU64::new(250).unwrap());

        let refreshes = (1..=1000).filter(|&s| cadence.should_refresh(s)).count();
        let checkpoints: Vec<_> = (1..=1000).filter(|&s| cadence.should_checkpoint(s)).collect();

        assert_eq!(refreshes, 10);
        assert_eq!(checkpoints, [250, 500, 750, 1000]);
    }
}
