use comms::{Base, Blob, Family};

use crate::Result;

/// The learning agent, the capability object both the coordinator and the
/// workers drive.
///
/// An agent is created through a zero argument factory injected at startup,
/// once per worker and once for the coordinator, and is never shared across
/// those owners.
pub trait Agent: Send {
    /// Capability flag, whether this agent maintains `family` at all.
    fn has(&self, family: Family) -> bool;

    /// Returns the current weights of `family`.
    fn params(&self, family: Family) -> Blob;

    /// Overwrites the weights of `family`.
    ///
    /// # Errors
    /// If the blob isn't a valid weight set for this agent.
    fn set_params(&mut self, family: Family, blob: Blob) -> Result<()>;

    /// Returns the gradient slot of `base`, as left by the last `train`.
    fn grads(&self, base: Base) -> Blob;

    /// Overwrites the gradient slot of `base`, consumed by the next `update`.
    fn set_grads(&mut self, base: Base, blob: Blob);

    /// Creates the optimizer that `update` uses for `base`.
    fn create_optimizer(&mut self, base: Base) -> Result<()>;

    /// Computes gradients from the locally gathered experience.
    fn train(&mut self) -> Result<()>;

    /// Applies the gradient slots to the weights.
    fn update(&mut self) -> Result<()>;

    /// Advances the current episode by one step.
    ///
    /// # Returns
    /// `false` once the episode is over.
    fn step(&mut self) -> Result<bool>;

    /// Resets the environment for a fresh episode.
    fn start_new_game(&mut self) -> Result<()>;

    /// Copies every base family into its target.
    fn update_target_func(&mut self) -> Result<()>;

    /// Persists a checkpoint.
    ///
    /// # Arguments
    /// * `label` - A free form checkpoint label.
    /// * `step` - The global step the checkpoint belongs to.
    fn save(&mut self, label: &str, step: u64) -> Result<()>;
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn has(&self, family: Family) -> bool {
        (**self).has(family)
    }

    fn params(&self, family: Family) -> Blob {
        (**self).params(family)
    }

    fn set_params(&mut self, family: Family, blob: Blob) -> Result<()> {
        (**self).set_params(family, blob)
    }

    fn grads(&self, base: Base) -> Blob {
        (**self).grads(base)
    }

    fn set_grads(&mut self, base: Base, blob: Blob) {
        (**self).set_grads(base, blob)
    }

    fn create_optimizer(&mut self, base: Base) -> Result<()> {
        (**self).create_optimizer(base)
    }

    fn train(&mut self) -> Result<()> {
        (**self).train()
    }

    fn update(&mut self) -> Result<()> {
        (**self).update()
    }

    fn step(&mut self) -> Result<bool> {
        (**self).step()
    }

    fn start_new_game(&mut self) -> Result<()> {
        (**self).start_new_game()
    }

    fn update_target_func(&mut self) -> Result<()> {
        (**self).update_target_func()
    }

    fn save(&mut self, label: &str, step: u64) -> Result<()> {
        (**self).save(label, step)
    }
}
