use std::convert::Infallible;

use agent::Agent;
use anyhow::Context;
use comms::specs::TrainingSpec;
use coordinator::{Console, Coordinator, Endpoints};
use log::info;
use tokio::{io::AsyncWrite, task::JoinSet};
use worker::{CoordinatorClient, Worker, WorkerConfig};

/// Runs a whole training cluster inside this process.
///
/// Workers are tokio tasks that only talk to the coordinator through loopback
/// channels, exactly like worker processes would.
///
/// # Arguments
/// * `spec` - The run's training spec.
/// * `factory` - Builds one agent per worker and one for the coordinator.
/// * `console` - The operator console.
///
/// # Returns
/// Only ever returns the first failure of the coordinator or of any worker.
pub async fn run_local<A, F, C>(
    spec: &TrainingSpec,
    factory: F,
    console: &mut Console<C>,
) -> anyhow::Result<Infallible>
where
    A: Agent + 'static,
    F: Fn() -> A,
    C: AsyncWrite + Unpin,
{
    let endpoints = Endpoints::bind(spec.workers).await?;
    let inbound = endpoints.inbound_addr()?;
    let mut workers = JoinSet::new();

    for (index, reply) in endpoints.outbound_addrs()?.into_iter().enumerate() {
        let cfg = WorkerConfig::from_spec(index, spec);
        let agent = factory();

        workers.spawn(async move {
            let mut client = CoordinatorClient::connect(&cfg, inbound, reply).await?;
            let mut worker = Worker::new(cfg, agent);
            worker.run(&mut client).await
        });
    }

    info!(workers = spec.workers.get(); "spawned local workers");

    let serve = async {
        let (inbox, handles) = endpoints.accept().await?;
        let mut coordinator = Coordinator::from_spec(factory(), handles, spec)?;
        let Err(e) = coordinator.run(inbox, console).await;
        Err::<Infallible, _>(anyhow::Error::new(e).context("coordinator failed"))
    };

    tokio::select! {
        res = serve => res,
        Some(joined) = workers.join_next() => {
            let Err(e) = joined?;
            Err(anyhow::Error::new(e).context("worker failed"))
        }
    }
}
