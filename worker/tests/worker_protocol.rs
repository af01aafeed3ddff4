use std::num::NonZeroU64;

use agent::Agent;
use comms::{Base, Blob, Family, msg::Msg, specs::RequestSpec};
use tokio::{
    io::{self, AsyncWriteExt},
    net::TcpListener,
};
use worker::{CoordinatorClient, Worker, WorkerConfig, WorkerErr};

/// Never ends an episode.
struct EndlessAgent;

impl Agent for EndlessAgent {
    fn has(&self, family: Family) -> bool {
        family == Family::V
    }

    fn params(&self, _: Family) -> Blob {
        Blob::default()
    }

    fn set_params(&mut self, _: Family, _: Blob) -> agent::Result<()> {
        Ok(())
    }

    fn grads(&self, _: Base) -> Blob {
        Blob::default()
    }

    fn set_grads(&mut self, _: Base, _: Blob) {}

    fn create_optimizer(&mut self, _: Base) -> agent::Result<()> {
        Ok(())
    }

    fn train(&mut self) -> agent::Result<()> {
        Ok(())
    }

    fn update(&mut self) -> agent::Result<()> {
        Ok(())
    }

    fn step(&mut self) -> agent::Result<bool> {
        Ok(true)
    }

    fn start_new_game(&mut self) -> agent::Result<()> {
        Ok(())
    }

    fn update_target_func(&mut self) -> agent::Result<()> {
        Ok(())
    }

    fn save(&mut self, _: &str, _: u64) -> agent::Result<()> {
        Ok(())
    }
}

fn config() -> WorkerConfig {
    WorkerConfig::new(1, NonZeroU64::new(100).unwrap(), RequestSpec::default())
}

#[tokio::test]
async fn worker_connects_over_loopback_and_syncs_first() -> io::Result<()> {
    let inbound = TcpListener::bind("127.0.0.1:0").await?;
    let reply = TcpListener::bind("127.0.0.1:0").await?;
    let (inbound_addr, reply_addr) = (inbound.local_addr()?, reply.local_addr()?);

    let worker = tokio::spawn(async move {
        let cfg = config();
        let mut client = CoordinatorClient::connect(&cfg, inbound_addr, reply_addr).await?;
        let mut worker = Worker::new(cfg, EndlessAgent);
        let Err(err) = worker.run(&mut client).await;
        Ok::<_, WorkerErr>((err, worker.metrics().steps))
    });

    let (stream, _) = inbound.accept().await?;
    let (rx, _) = stream.into_split();
    let (mut rx, _) = comms::channel(rx, io::sink());

    let (stream, _) = reply.accept().await?;
    let (_, tx) = stream.into_split();
    let (_, mut tx) = comms::channel(io::empty(), tx);

    assert_eq!(rx.recv::<Msg>().await?, Msg::ParamsRequest { worker: 1 });
    tx.send(&Msg::Params(Default::default())).await?;

    for _ in 0..3 {
        assert_eq!(rx.recv::<Msg>().await?, Msg::Step { worker: 1 });
        tx.send(&Msg::Ack).await?;
    }

    // The coordinator going away is fatal for the worker.
    drop(rx);
    drop(tx);

    let (err, steps) = worker.await.unwrap().unwrap();
    assert!(matches!(err, WorkerErr::Io(_)), "got {err}");
    assert_eq!(steps, 3);
    Ok(())
}

#[tokio::test]
async fn garbage_reply_is_a_fatal_protocol_violation() -> io::Result<()> {
    let (wk_out, _sv_in) = io::duplex(4096);
    let (mut sv_out, wk_in) = io::duplex(4096);

    let (wk_rx, _) = comms::channel(wk_in, io::sink());
    let (_, wk_tx) = comms::channel(io::empty(), wk_out);
    let mut client = CoordinatorClient::new(1, wk_rx, wk_tx, RequestSpec::default());

    // A frame carrying an unknown kind header.
    let mut frame = 4u64.to_be_bytes().to_vec();
    frame.extend_from_slice(&77u32.to_be_bytes());
    sv_out.write_all(&frame).await?;

    let mut worker = Worker::new(config(), EndlessAgent);
    let Err(err) = worker.run(&mut client).await;

    let WorkerErr::Io(e) = err else {
        panic!("expected an io error, got {err}");
    };
    assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    Ok(())
}
