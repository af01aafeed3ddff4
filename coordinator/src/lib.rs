mod cadence;
mod console;
mod coordinator;
mod endpoints;
mod error;
mod inbox;

pub use cadence::Cadence;
pub use console::{Command, Console};
pub use coordinator::Coordinator;
pub use endpoints::{Endpoints, WorkerHandle};
pub use error::{CoordinatorErr, Result};
pub use inbox::Inbox;
