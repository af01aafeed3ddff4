use std::convert::Infallible;

use agent::Agent;
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{CoordinatorClient, Result, Schedule, WorkerConfig, WorkerMetrics};

/// Drives one agent through endless episodes against the coordinator.
///
/// Lifecycle:
/// - pulls the coordinator's parameters before the first episode,
/// - notifies every successful `step` and waits for its ack,
/// - every `local_update` episode steps, and once more when the episode ends,
///   trains, uploads the gradients and pulls fresh parameters.
pub struct Worker<A: Agent> {
    cfg: WorkerConfig,
    schedule: Schedule,
    metrics: WorkerMetrics,
    agent: A,
}

impl<A: Agent> Worker<A> {
    /// Creates a new worker.
    ///
    /// # Args
    /// * `cfg` - The worker configuration.
    /// * `agent` - This worker's exclusively owned agent.
    ///
    /// # Returns
    /// A new worker instance.
    pub fn new(cfg: WorkerConfig, agent: A) -> Self {
        Self {
            schedule: Schedule::new(cfg.local_update),
            metrics: WorkerMetrics::default(),
            cfg,
            agent,
        }
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Runs the worker loop.
    ///
    /// There is no way to stop a worker from the outside, the loop only ends
    /// when something fails.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failures, reply timeouts, protocol violations
    /// and agent failures.
    pub async fn run<R, W>(&mut self, client: &mut CoordinatorClient<R, W>) -> Result<Infallible>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(worker = self.cfg.index; "starting worker loop");
        self.sync(client).await?;

        loop {
            self.agent.start_new_game()?;
            let mut local_step = 0;

            while self.agent.step()? {
                client.step().await?;
                self.metrics.bump_step();
                local_step += 1;

                if self.schedule.should_sync(local_step) {
                    self.round(client).await?;
                }
            }

            self.round(client).await?;
            self.metrics.bump_episode();

            debug!(
                worker = self.cfg.index, steps = local_step;
                "episode finished: {:?}", self.metrics
            );
        }
    }

    /// Trains locally, uploads the gradients and pulls fresh parameters.
    async fn round<R, W>(&mut self, client: &mut CoordinatorClient<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.agent.train()?;

        let grads = agent::collect_grads(&self.agent);
        client.push_grads(grads).await?;
        self.sync(client).await?;

        self.metrics.bump_round();
        Ok(())
    }

    /// Replaces the local parameters with the coordinator's.
    async fn sync<R, W>(&mut self, client: &mut CoordinatorClient<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let params = client.pull_params().await?;
        agent::apply_params(&mut self.agent, params)?;
        Ok(())
    }
}
