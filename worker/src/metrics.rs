#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerMetrics {
    /// Successful `step` calls acknowledged by the coordinator.
    pub steps: u64,
    /// Train, upload and sync rounds.
    pub rounds: u64,
    /// Finished episodes.
    pub episodes: u64,
}

impl WorkerMetrics {
    #[inline]
    pub fn bump_step(&mut self) {
        self.steps += 1;
    }

    #[inline]
    pub fn bump_round(&mut self) {
        self.rounds += 1;
    }

    #[inline]
    pub fn bump_episode(&mut self) {
        self.episodes += 1;
    }
}
