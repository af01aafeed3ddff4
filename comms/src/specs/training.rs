use std::{
    fs, io,
    num::{NonZeroU64, NonZeroUsize},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::Base;

/// The specification for a whole training run, shared by the coordinator and
/// every worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSpec {
    /// Amount of worker processes.
    pub workers: NonZeroUsize,
    /// Worker local steps between train, upload and sync rounds.
    pub local_update: NonZeroU64,
    /// Global steps between target network refreshes.
    pub target_refresh: NonZeroU64,
    /// Global steps between automatic checkpoints.
    pub checkpoint: NonZeroU64,
    pub optimizers: OptimizerToggles,
    pub request: RequestSpec,
    /// The label handed to the agent on every save.
    pub checkpoint_label: String,
    /// Upper bound for the operator console poll after each message.
    pub poll_interval_ms: u64,
}

/// Per family optimizer construction toggles for the coordinator's agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerToggles {
    pub v: bool,
    pub q: bool,
    pub p: bool,
}

/// Reply wait policy for the worker's request/response round trips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSpec {
    pub timeout_ms: u64,
    /// Expired waits tolerated before giving up, `None` waits for as long as
    /// the coordinator keeps the channel open.
    pub retries: Option<u32>,
    pub backoff: f64,
}

impl Default for TrainingSpec {
    fn default() -> Self {
        Self {
            workers: NonZeroUsize::new(8).unwrap(),
            local_update: NonZeroU64::new(5).unwrap(),
            target_refresh: NonZeroU64::new(1_000).unwrap(),
            checkpoint: NonZeroU64::new(1_000_000).unwrap(),
            optimizers: OptimizerToggles::default(),
            request: RequestSpec::default(),
            checkpoint_label: String::new(),
            poll_interval_ms: 1,
        }
    }
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retries: None,
            backoff: 2.0,
        }
    }
}

impl TrainingSpec {
    /// Parses and validates a spec from a json string.
    ///
    /// # Returns
    /// The spec or an `InvalidData` io error.
    pub fn from_json_str(json: &str) -> io::Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reads, parses and validates a spec from a json file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serializes the spec so it can be handed to a child process.
    pub fn to_json(&self) -> String {
        // SAFETY: Serialize impl is derived and every map key is a string.
        serde_json::to_string(self).unwrap()
    }

    /// Checks the constraints that the type system can't express.
    pub fn validate(&self) -> io::Result<()> {
        self.request.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl OptimizerToggles {
    /// The base families whose optimizer must be created.
    pub fn enabled(&self) -> impl Iterator<Item = Base> + '_ {
        Base::ALL.into_iter().filter(|base| match base {
            Base::V => self.v,
            Base::Q => self.q,
            Base::P => self.p,
        })
    }
}

impl RequestSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The wait that follows an expired `prev` one, saturating at `Duration::MAX`.
    pub fn next_timeout(&self, prev: Duration) -> Duration {
        Duration::try_from_secs_f64(prev.as_secs_f64() * self.backoff).unwrap_or(Duration::MAX)
    }

    fn validate(&self) -> io::Result<()> {
        if self.timeout_ms == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request timeout must be greater than zero",
            ));
        }

        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("request backoff must be at least 1.0, got {}", self.backoff),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_the_defaults() {
        let spec = TrainingSpec::from_json_str("{}").unwrap();
        assert_eq!(spec, TrainingSpec::default());
        assert_eq!(spec.workers.get(), 8);
        assert_eq!(spec.local_update.get(), 5);
        assert_eq!(spec.target_refresh.get(), 1_000);
        assert_eq!(spec.checkpoint.get(), 1_000_000);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let json = r#"{ "workers": 3, "optimizers": { "q": true }, "request": { "retries": 0 } }"#;
        let spec = TrainingSpec::from_json_str(json).unwrap();

        assert_eq!(spec.workers.get(), 3);
        assert_eq!(spec.optimizers.enabled().collect::<Vec<_>>(), vec![Base::Q]);
        assert_eq!(spec.request.retries, Some(0));
        assert_eq!(spec.request.timeout_ms, 30_000);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(TrainingSpec::from_json_str(r#"{ "target_refresh": 0 }"#).is_err());
        assert!(TrainingSpec::from_json_str(r#"{ "workers": 0 }"#).is_err());
    }

    #[test]
    fn shrinking_backoff_is_rejected() {
        let json = r#"{ "request": { "backoff": 0.5 } }"#;
        assert!(TrainingSpec::from_json_str(json).is_err());
    }

    #[test]
    fn reply_waits_are_unbounded_by_default() {
        let spec = TrainingSpec::from_json_str("{}").unwrap();
        assert_eq!(spec.request.retries, None);
    }

    #[test]
    fn huge_backoff_saturates() {
        let json = r#"{ "request": { "timeout_ms": 1, "backoff": 1e300 } }"#;
        let request = TrainingSpec::from_json_str(json).unwrap().request;

        let next = request.next_timeout(request.timeout());
        assert_eq!(next, Duration::MAX);
        assert_eq!(request.next_timeout(next), Duration::MAX);
    }

    #[test]
    fn json_round_trip_for_child_processes() {
        let spec = TrainingSpec {
            checkpoint_label: "run".into(),
            ..TrainingSpec::default()
        };

        assert_eq!(TrainingSpec::from_json_str(&spec.to_json()).unwrap(), spec);
    }
}
