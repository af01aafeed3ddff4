//! Moves blobs between an agent and the wire maps.
//!
//! A family appears in a map if and only if the agent's capability flag for it
//! is set when the map is built.

use comms::{Base, Family, GradMap, ParamMap};

use crate::{Agent, Result};

/// Gathers the weights of every present family, targets included.
pub fn collect_params<A: Agent + ?Sized>(agent: &A) -> ParamMap {
    Family::ALL
        .into_iter()
        .filter(|&family| agent.has(family))
        .map(|family| (family, agent.params(family)))
        .collect()
}

/// Gathers the gradient slot of every present base family.
pub fn collect_grads<A: Agent + ?Sized>(agent: &A) -> GradMap {
    Base::ALL
        .into_iter()
        .filter(|base| agent.has(base.family()))
        .map(|base| (base, agent.grads(base)))
        .collect()
}

/// Applies every received family through its setter.
///
/// # Errors
/// The first setter failure, later families are left untouched.
pub fn apply_params<A: Agent + ?Sized>(agent: &mut A, params: ParamMap) -> Result<()> {
    for (family, blob) in params {
        agent.set_params(family, blob)?;
    }

    Ok(())
}

/// Overwrites the gradient slots of every received family, no accumulation.
pub fn apply_grads<A: Agent + ?Sized>(agent: &mut A, grads: GradMap) {
    for (base, blob) in grads {
        agent.set_grads(base, blob);
    }
}
