use std::io;

use comms::{OnoReceiver, msg::Msg};
use log::{debug, warn};
use tokio::{io::AsyncRead, sync::mpsc, task::JoinSet};

use crate::{CoordinatorErr, Result};

/// The aggregation channel, every worker's inbound stream merged into a single
/// queue consumed by the coordinator loop in arrival order.
pub struct Inbox {
    rx: mpsc::Receiver<io::Result<Msg>>,
    _readers: JoinSet<()>,
}

impl Inbox {
    /// Spawns one reader task per inbound stream.
    ///
    /// A stream that fails with anything but a protocol violation is a worker
    /// that went away, its reader stops without failing the inbox.
    ///
    /// The queue holds one slot per stream, a worker never has more than one
    /// unanswered message in flight.
    ///
    /// # Arguments
    /// * `streams` - The receiving ends of every worker's inbound channel.
    ///
    /// # Returns
    /// A new `Inbox` instance.
    pub fn new<R>(streams: Vec<OnoReceiver<R>>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(streams.len().max(1));
        let mut readers = JoinSet::new();

        for (id, stream) in streams.into_iter().enumerate() {
            readers.spawn(Self::forward(id, stream, tx.clone()));
        }

        Self {
            rx,
            _readers: readers,
        }
    }

    /// Waits for the next inbound message.
    ///
    /// # Errors
    /// Decoding failures of any stream, or `InboxClosed` once every stream ended.
    pub async fn recv(&mut self) -> Result<Msg> {
        match self.rx.recv().await {
            Some(msg) => Ok(msg?),
            None => Err(CoordinatorErr::InboxClosed),
        }
    }

    async fn forward<R>(id: usize, mut stream: OnoReceiver<R>, tx: mpsc::Sender<io::Result<Msg>>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let res = stream.recv::<Msg>().await;

            if let Err(e) = &res {
                if e.kind() != io::ErrorKind::InvalidData {
                    warn!(stream = id; "inbound stream closed: {e}");
                    return;
                }
            }

            let failed = res.is_err();
            if tx.send(res).await.is_err() || failed {
                debug!(stream = id; "inbound reader stopped");
                return;
            }
        }
    }
}
