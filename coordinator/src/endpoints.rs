use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    num::NonZeroUsize,
};

use comms::{OnoSender, msg::Msg};
use futures::future;
use log::info;
use tokio::{
    io::AsyncWrite,
    net::{TcpListener, tcp::OwnedWriteHalf},
};

use crate::Inbox;

/// Immutable pairing of a worker index with its dedicated reply channel.
pub struct WorkerHandle<W: AsyncWrite + Unpin> {
    index: usize,
    tx: OnoSender<W>,
}

impl<W: AsyncWrite + Unpin> WorkerHandle<W> {
    pub fn new(index: usize, tx: OnoSender<W>) -> Self {
        Self { index, tx }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Sends a reply to this worker.
    pub async fn send(&mut self, msg: &Msg) -> io::Result<()> {
        self.tx.send(msg).await
    }
}

/// The coordinator's loopback listeners: one aggregation endpoint shared by
/// every worker and one reply endpoint per worker.
pub struct Endpoints {
    inbound: TcpListener,
    outbound: Vec<TcpListener>,
}

impl Endpoints {
    /// Binds every endpoint on an OS assigned loopback port.
    ///
    /// # Arguments
    /// * `workers` - The amount of workers to bind reply endpoints for.
    pub async fn bind(workers: NonZeroUsize) -> io::Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let inbound = TcpListener::bind(addr).await?;

        let mut outbound = Vec::with_capacity(workers.get());
        for _ in 0..workers.get() {
            outbound.push(TcpListener::bind(addr).await?);
        }

        info!("aggregation endpoint bound at {}", inbound.local_addr()?);
        Ok(Self { inbound, outbound })
    }

    /// The address every worker sends its messages to.
    pub fn inbound_addr(&self) -> io::Result<SocketAddr> {
        self.inbound.local_addr()
    }

    /// The reply address of every worker, indexed by worker.
    pub fn outbound_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.outbound.iter().map(TcpListener::local_addr).collect()
    }

    /// Waits until every worker opened both of its channels.
    ///
    /// # Returns
    /// The aggregation inbox and the reply handles ordered by worker index.
    pub async fn accept(self) -> io::Result<(Inbox, Vec<WorkerHandle<OwnedWriteHalf>>)> {
        let workers = self.outbound.len();

        let mut streams = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (stream, addr) = self.inbound.accept().await?;
            let (rx, _) = stream.into_split();
            let (rx, _) = comms::channel(rx, tokio::io::sink());
            streams.push(rx);
            info!("inbound stream {} accepted from {addr}", streams.len() - 1);
        }

        let accepts = self.outbound.iter().enumerate().map(|(index, list)| async move {
            let (stream, addr) = list.accept().await?;
            let (_, tx) = stream.into_split();
            let (_, tx) = comms::channel(tokio::io::empty(), tx);
            info!(worker = index; "reply channel accepted from {addr}");
            Ok::<_, io::Error>(WorkerHandle::new(index, tx))
        });

        let handles = future::try_join_all(accepts).await?;
        Ok((Inbox::new(streams), handles))
    }
}
