use std::{error::Error, fmt, io};

/// The coordinator module's result type.
pub type Result<T> = std::result::Result<T, CoordinatorErr>;

/// Coordinator failures, none of them is recovered from.
#[derive(Debug)]
pub enum CoordinatorErr {
    Io(io::Error),
    Agent(anyhow::Error),
    /// A message named a worker index without a reply channel.
    UnknownWorker { worker: usize, workers: usize },
    /// A reply kind message arrived on the aggregation channel.
    UnexpectedMessage { got: &'static str },
    /// Every worker hung up.
    InboxClosed,
}

impl fmt::Display for CoordinatorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Agent(e) => write!(f, "agent error: {e:#}"),
            Self::UnknownWorker { worker, workers } => {
                write!(f, "unknown worker {worker}, only {workers} workers are bound")
            }
            Self::UnexpectedMessage { got } => {
                write!(f, "unexpected message on the aggregation channel: {got}")
            }
            Self::InboxClosed => f.write_str("every worker disconnected"),
        }
    }
}

impl Error for CoordinatorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Agent(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<anyhow::Error> for CoordinatorErr {
    fn from(e: anyhow::Error) -> Self {
        Self::Agent(e)
    }
}

impl From<CoordinatorErr> for io::Error {
    fn from(value: CoordinatorErr) -> Self {
        match value {
            CoordinatorErr::Io(e) => e,
            CoordinatorErr::InboxClosed => io::Error::new(io::ErrorKind::UnexpectedEof, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
