//! Coordinator to worker process handoff through environment variables.

use std::{env, io, net::SocketAddr, process::Stdio};

use anyhow::Context;
use comms::specs::TrainingSpec;
use log::info;
use tokio::process::{Child, Command};

pub const WORKER_INDEX: &str = "ASYN_WORKER_INDEX";
pub const INBOUND_ADDR: &str = "ASYN_INBOUND_ADDR";
pub const REPLY_ADDR: &str = "ASYN_REPLY_ADDR";
pub const SPEC: &str = "ASYN_SPEC";

/// Everything a worker process needs to join the run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEnv {
    pub index: usize,
    pub inbound: SocketAddr,
    pub reply: SocketAddr,
    pub spec: TrainingSpec,
}

impl WorkerEnv {
    /// Reads the handoff from this process' environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the handoff through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).with_context(|| format!("{key} is not set"));

        Ok(Self {
            index: var(WORKER_INDEX)?.parse().context(WORKER_INDEX)?,
            inbound: var(INBOUND_ADDR)?.parse().context(INBOUND_ADDR)?,
            reply: var(REPLY_ADDR)?.parse().context(REPLY_ADDR)?,
            spec: TrainingSpec::from_json_str(&var(SPEC)?).context(SPEC)?,
        })
    }

    /// The variables that hand this environment over to a child process.
    pub fn vars(&self) -> [(&'static str, String); 4] {
        [
            (WORKER_INDEX, self.index.to_string()),
            (INBOUND_ADDR, self.inbound.to_string()),
            (REPLY_ADDR, self.reply.to_string()),
            (SPEC, self.spec.to_json()),
        ]
    }
}

/// Spawns one worker process of the current executable per reply address.
///
/// The children never read the operator's input and are killed once their
/// handle is dropped.
///
/// # Arguments
/// * `spec` - The run's training spec.
/// * `inbound` - The coordinator's aggregation endpoint.
/// * `replies` - The reply endpoints, indexed by worker.
pub fn spawn_workers(
    spec: &TrainingSpec,
    inbound: SocketAddr,
    replies: &[SocketAddr],
) -> io::Result<Vec<Child>> {
    let exe = env::current_exe()?;

    replies
        .iter()
        .enumerate()
        .map(|(index, &reply)| {
            let handoff = WorkerEnv {
                index,
                inbound,
                reply,
                spec: spec.clone(),
            };

            let child = Command::new(&exe)
                .arg("worker")
                .envs(handoff.vars())
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()?;

            info!(worker = index; "spawned worker process {:?}", child.id());
            Ok(child)
        })
        .collect()
}
