use std::{error::Error, fmt, io, time::Duration};

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures, every one of them terminates the worker.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Agent(anyhow::Error),
    Timeout {
        expected: &'static str,
        waited: Duration,
    },
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Agent(e) => write!(f, "agent error: {e:#}"),
            WorkerErr::Timeout { expected, waited } => {
                write!(f, "no {expected} reply from the coordinator after {waited:?}")
            }
            WorkerErr::UnexpectedMessage { expected, got } => {
                write!(f, "unexpected message: expected {expected}, got {got}")
            }
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Agent(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<anyhow::Error> for WorkerErr {
    fn from(value: anyhow::Error) -> Self {
        Self::Agent(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            WorkerErr::Timeout { .. } => io::Error::new(io::ErrorKind::TimedOut, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
