use std::{env, path::PathBuf, process};

use anyhow::Context;
use asyn_train::{
    demo::LinearAgent,
    launch::{self, WorkerEnv},
};
use comms::specs::TrainingSpec;
use coordinator::{Console, Coordinator, Endpoints};
use log::{error, info};
use worker::{CoordinatorClient, Worker, WorkerConfig};

const CHECKPOINT_DIR: &str = "checkpoints";

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(mode) = args.get(1) else {
        eprintln!("Usage: {} <coordinator [spec.json]|worker|local [spec.json]>", args[0]);
        process::exit(1);
    };

    let res = match mode.as_str() {
        "coordinator" => run_coordinator(args.get(2)).await,
        "local" => run_cluster(args.get(2)).await,
        "worker" => run_worker().await,
        _ => {
            eprintln!("Unknown mode: {mode}. You must use 'coordinator', 'worker' or 'local'.");
            process::exit(1);
        }
    };

    if let Err(e) = res {
        error!("{e:#}");
        process::exit(1);
    }
}

fn load_spec(path: Option<&String>) -> anyhow::Result<TrainingSpec> {
    match path {
        Some(path) => TrainingSpec::from_json_file(path).with_context(|| format!("loading {path}")),
        None => Ok(TrainingSpec::default()),
    }
}

fn demo_agent() -> LinearAgent {
    LinearAgent::new(PathBuf::from(CHECKPOINT_DIR))
}

async fn run_coordinator(path: Option<&String>) -> anyhow::Result<()> {
    let spec = load_spec(path)?;
    let endpoints = Endpoints::bind(spec.workers).await?;
    let inbound = endpoints.inbound_addr()?;
    let replies = endpoints.outbound_addrs()?;

    let _children = launch::spawn_workers(&spec, inbound, &replies)?;
    let (inbox, handles) = endpoints.accept().await?;
    info!(workers = handles.len(); "every worker connected");

    let mut coordinator = Coordinator::from_spec(demo_agent(), handles, &spec)?;
    let mut console = Console::stdio(spec.poll_interval());

    let Err(e) = coordinator.run(inbox, &mut console).await;
    Err(e.into())
}

async fn run_cluster(path: Option<&String>) -> anyhow::Result<()> {
    let spec = load_spec(path)?;
    let mut console = Console::stdio(spec.poll_interval());

    let Err(e) = asyn_train::run_local(&spec, demo_agent, &mut console).await;
    Err(e)
}

async fn run_worker() -> anyhow::Result<()> {
    let handoff = WorkerEnv::from_env()?;
    let cfg = WorkerConfig::from_spec(handoff.index, &handoff.spec);

    let mut client = CoordinatorClient::connect(&cfg, handoff.inbound, handoff.reply).await?;
    let mut worker = Worker::new(cfg, demo_agent());

    let Err(e) = worker.run(&mut client).await;
    Err(e).with_context(|| format!("worker {} failed", handoff.index))
}
