use std::convert::Infallible;

use agent::Agent;
use comms::{GradMap, msg::Msg, specs::TrainingSpec};
use log::{debug, info, warn};
use tokio::io::AsyncWrite;

use crate::{Cadence, Command, Console, CoordinatorErr, Inbox, Result, WorkerHandle};

/// The coordinator, sole owner of the canonical agent and the global step counter.
///
/// Every message is handled to completion before the next one is taken, so the
/// agent's parameters and gradient slots have a single writer.
pub struct Coordinator<A, W>
where
    A: Agent,
    W: AsyncWrite + Unpin,
{
    agent: A,
    workers: Vec<WorkerHandle<W>>,
    cadence: Cadence,
    label: String,
    steps: u64,
}

impl<A, W> Coordinator<A, W>
where
    A: Agent,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Coordinator`.
    ///
    /// # Arguments
    /// * `agent` - The canonical agent.
    /// * `workers` - The reply handles, indexed by worker.
    /// * `cadence` - The target refresh and checkpoint intervals.
    /// * `label` - The label used for every checkpoint.
    pub fn new(agent: A, workers: Vec<WorkerHandle<W>>, cadence: Cadence, label: String) -> Self {
        Self {
            agent,
            workers,
            cadence,
            label,
            steps: 0,
        }
    }

    /// Creates a coordinator from a training spec and builds the optimizers it
    /// enables.
    ///
    /// # Errors
    /// If the agent fails to create an optimizer.
    pub fn from_spec(mut agent: A, workers: Vec<WorkerHandle<W>>, spec: &TrainingSpec) -> Result<Self> {
        for base in spec.optimizers.enabled() {
            info!("creating the {base:?} optimizer");
            agent.create_optimizer(base)?;
        }

        let cadence = Cadence::from_spec(spec);
        Ok(Self::new(agent, workers, cadence, spec.checkpoint_label.clone()))
    }

    /// The amount of `Step` messages handled so far.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Checkpoints the agent at the current global step.
    pub fn save(&mut self) -> Result<()> {
        info!(step = self.steps; "saving checkpoint");
        self.agent.save(&self.label, self.steps)?;
        Ok(())
    }

    /// Handles a single inbound message.
    ///
    /// # Errors
    /// Every error is fatal for the coordinator.
    pub async fn handle(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Step { worker } => self.on_step(worker).await,
            Msg::ParamsRequest { worker } => self.on_params_request(worker).await,
            Msg::GradsUpload { worker, grads } => self.on_grads_upload(worker, grads).await,
            other => Err(CoordinatorErr::UnexpectedMessage { got: other.kind() }),
        }
    }

    /// Serves inbound messages forever, polling the console after each one.
    ///
    /// # Returns
    /// Only ever returns an error.
    pub async fn run<C>(&mut self, mut inbox: Inbox, console: &mut Console<C>) -> Result<Infallible>
    where
        C: AsyncWrite + Unpin,
    {
        info!(workers = self.workers.len(); "coordinator started");

        loop {
            let msg = inbox.recv().await?;
            self.handle(msg).await?;

            if console.poll().await? {
                self.interact(console).await?;
            }
        }
    }

    /// Runs the operator prompt until it's told to resume.
    async fn interact<C>(&mut self, console: &mut Console<C>) -> Result<()>
    where
        C: AsyncWrite + Unpin,
    {
        while let Some(cmd) = console.prompt().await? {
            match cmd {
                Command::Save => self.save()?,
                Command::Quit => break,
                Command::Unknown(line) => warn!("unknown console command {line:?}"),
            }
        }

        info!(step = self.steps; "resuming training");
        Ok(())
    }

    async fn on_step(&mut self, worker: usize) -> Result<()> {
        self.reply(worker, &Msg::Ack).await?;
        self.steps += 1;

        let step = self.steps;
        if self.cadence.should_refresh(step) {
            debug!(step = step; "refreshing target functions");
            self.agent.update_target_func()?;
        }

        if self.cadence.should_checkpoint(step) {
            self.save()?;
        }

        Ok(())
    }

    async fn on_params_request(&mut self, worker: usize) -> Result<()> {
        let params = agent::collect_params(&self.agent);
        debug!(worker = worker; "serving {} parameter families", params.len());
        self.reply(worker, &Msg::Params(params)).await
    }

    async fn on_grads_upload(&mut self, worker: usize, grads: GradMap) -> Result<()> {
        self.reply(worker, &Msg::Ack).await?;

        debug!(worker = worker; "applying {} gradient families", grads.len());
        agent::apply_grads(&mut self.agent, grads);
        self.agent.update()?;
        Ok(())
    }

    async fn reply(&mut self, worker: usize, msg: &Msg) -> Result<()> {
        let workers = self.workers.len();
        let handle = self
            .workers
            .get_mut(worker)
            .ok_or(CoordinatorErr::UnknownWorker { worker, workers })?;

        handle.send(msg).await?;
        Ok(())
    }
}
