use std::{net::SocketAddr, time::Duration};

use comms::{GradMap, OnoReceiver, OnoSender, ParamMap, msg::Msg, specs::RequestSpec};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use crate::{Result, WorkerConfig, WorkerErr};

/// Coordinator client wrapper.
///
/// Contract:
/// - `Step` and `GradsUpload` go out on the aggregation channel and are answered
///   with an `Ack` on this worker's private channel.
/// - `ParamsRequest` is answered with `Params` on the private channel.
///
/// Reply waits follow the request policy and only fail once its retry limit,
/// if any, runs out. Requests themselves are never re-sent since a `Step` is
/// counted on arrival.
pub struct CoordinatorClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    worker: usize,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    policy: RequestSpec,
}

impl CoordinatorClient<OwnedReadHalf, OwnedWriteHalf> {
    /// Opens both channels against the coordinator's endpoints.
    ///
    /// # Args
    /// * `cfg` - The worker's settings, its index and reply wait policy are used.
    /// * `inbound_addr` - The coordinator's aggregation endpoint.
    /// * `reply_addr` - This worker's private reply endpoint.
    pub async fn connect(
        cfg: &WorkerConfig,
        inbound_addr: SocketAddr,
        reply_addr: SocketAddr,
    ) -> Result<Self> {
        let worker = cfg.index;
        let (_, tx) = TcpStream::connect(inbound_addr).await?.into_split();
        let (rx, _) = TcpStream::connect(reply_addr).await?.into_split();
        info!(worker = worker; "connected to coordinator at {inbound_addr}, replies from {reply_addr}");

        let (rx, _) = comms::channel(rx, tokio::io::sink());
        let (_, tx) = comms::channel(tokio::io::empty(), tx);
        Ok(Self::new(worker, rx, tx, cfg.request))
    }
}

impl<R, W> CoordinatorClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(worker: usize, rx: OnoReceiver<R>, tx: OnoSender<W>, policy: RequestSpec) -> Self {
        Self {
            worker,
            rx,
            tx,
            policy,
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Notifies one local step and waits for its acknowledgment.
    pub async fn step(&mut self) -> Result<()> {
        let msg = Msg::Step {
            worker: self.worker,
        };

        self.tx.send(&msg).await?;
        self.expect_ack().await
    }

    /// Requests the coordinator's current parameters.
    ///
    /// # Returns
    /// One blob per family the coordinator's agent holds.
    pub async fn pull_params(&mut self) -> Result<ParamMap> {
        let msg = Msg::ParamsRequest {
            worker: self.worker,
        };

        self.tx.send(&msg).await?;

        match self.wait_reply("params").await? {
            Msg::Params(params) => {
                debug!(worker = self.worker; "received {} parameter families", params.len());
                Ok(params)
            }
            other => Err(WorkerErr::UnexpectedMessage {
                expected: "params",
                got: other.kind(),
            }),
        }
    }

    /// Uploads the local gradients and waits for their acknowledgment.
    pub async fn push_grads(&mut self, grads: GradMap) -> Result<()> {
        let msg = Msg::GradsUpload {
            worker: self.worker,
            grads,
        };

        self.tx.send(&msg).await?;
        self.expect_ack().await
    }

    async fn expect_ack(&mut self) -> Result<()> {
        match self.wait_reply("ack").await? {
            Msg::Ack => Ok(()),
            other => Err(WorkerErr::UnexpectedMessage {
                expected: "ack",
                got: other.kind(),
            }),
        }
    }

    /// Waits for the next reply, extending the deadline by the backoff factor
    /// each time it expires.
    ///
    /// The same receive future is polled across every attempt, so a frame that
    /// is halfway read when a deadline fires is never lost. Without a retry
    /// limit the wait only ends with a reply or a closed channel, the
    /// coordinator may be paused by its operator for any amount of time.
    async fn wait_reply(&mut self, expected: &'static str) -> Result<Msg> {
        let Self {
            worker, rx, policy, ..
        } = self;

        let recv = rx.recv::<Msg>();
        tokio::pin!(recv);

        let mut deadline = policy.timeout();
        let mut waited = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            match time::timeout(deadline, &mut recv).await {
                Ok(msg) => return Ok(msg?),
                Err(_) => {
                    waited = waited.saturating_add(deadline);
                    warn!(
                        worker = *worker, attempt = attempt;
                        "no {expected} reply after {waited:?}"
                    );

                    if policy.retries.is_some_and(|retries| attempt >= retries) {
                        return Err(WorkerErr::Timeout { expected, waited });
                    }

                    attempt = attempt.saturating_add(1);
                    deadline = policy.next_timeout(deadline);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use comms::{Blob, Family};
    use tokio::io::{self, DuplexStream};

    use super::*;

    type Client = CoordinatorClient<DuplexStream, DuplexStream>;
    type Peer = (OnoReceiver<DuplexStream>, OnoSender<DuplexStream>);

    fn client_pair(policy: RequestSpec) -> (Client, Peer) {
        let (wk_out, sv_in) = io::duplex(4096);
        let (sv_out, wk_in) = io::duplex(4096);

        let (wk_rx, _) = comms::channel(wk_in, io::duplex(1).0);
        let (_, wk_tx) = comms::channel(io::duplex(1).0, wk_out);
        let (sv_rx, _) = comms::channel(sv_in, io::duplex(1).0);
        let (_, sv_tx) = comms::channel(io::duplex(1).0, sv_out);

        (Client::new(3, wk_rx, wk_tx, policy), (sv_rx, sv_tx))
    }

    #[tokio::test]
    async fn step_round_trip() -> io::Result<()> {
        let (mut client, (mut sv_rx, mut sv_tx)) = client_pair(RequestSpec::default());

        let server = async move {
            let msg: Msg = sv_rx.recv().await?;
            assert_eq!(msg, Msg::Step { worker: 3 });
            sv_tx.send(&Msg::Ack).await
        };

        let (res, served) = tokio::join!(client.step(), server);
        served?;
        res?;
        Ok(())
    }

    #[tokio::test]
    async fn params_reply_is_returned_whole() -> io::Result<()> {
        let (mut client, (mut sv_rx, mut sv_tx)) = client_pair(RequestSpec::default());
        let params = ParamMap::from([(Family::V, Blob::new(vec![1, 2]))]);
        let reply = params.clone();

        let server = async move {
            let msg: Msg = sv_rx.recv().await?;
            assert_eq!(msg, Msg::ParamsRequest { worker: 3 });
            sv_tx.send(&Msg::Params(reply)).await
        };

        let (res, served) = tokio::join!(client.pull_params(), server);
        served?;
        assert_eq!(res?, params);
        Ok(())
    }

    #[tokio::test]
    async fn ack_in_place_of_params_is_a_violation() {
        let (mut client, (_sv_rx, mut sv_tx)) = client_pair(RequestSpec::default());
        sv_tx.send(&Msg::Ack).await.unwrap();

        let err = client.pull_params().await.unwrap_err();
        assert!(matches!(
            err,
            WorkerErr::UnexpectedMessage {
                expected: "params",
                got: "ack"
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_coordinator_times_out_after_backoff() {
        let policy = RequestSpec {
            timeout_ms: 100,
            retries: Some(2),
            backoff: 2.0,
        };
        let (mut client, _peer) = client_pair(policy);

        let err = client.step().await.unwrap_err();
        let WorkerErr::Timeout { expected, waited } = err else {
            panic!("expected a timeout, got {err}");
        };

        assert_eq!(expected, "ack");
        let total = Duration::from_millis(100 + 200 + 400);
        assert!(waited.abs_diff(total) < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_within_retries_is_accepted() {
        let policy = RequestSpec {
            timeout_ms: 100,
            retries: Some(1),
            backoff: 2.0,
        };
        let (mut client, (_sv_rx, mut sv_tx)) = client_pair(policy);

        let server = async move {
            time::sleep(Duration::from_millis(150)).await;
            sv_tx.send(&Msg::Ack).await
        };

        let (res, served) = tokio::join!(client.step(), server);
        served.unwrap();
        res.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_wait_outlasts_a_long_pause() {
        let policy = RequestSpec {
            timeout_ms: 100,
            retries: None,
            backoff: 1.0,
        };
        let (mut client, (_sv_rx, mut sv_tx)) = client_pair(policy);

        let server = async move {
            time::sleep(Duration::from_secs(600)).await;
            sv_tx.send(&Msg::Ack).await
        };

        let (res, served) = tokio::join!(client.step(), server);
        served.unwrap();
        res.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn huge_backoff_times_out_without_overflow() {
        let policy = RequestSpec {
            timeout_ms: 1,
            retries: Some(0),
            backoff: 1e300,
        };
        let (mut client, _peer) = client_pair(policy);

        let err = client.step().await.unwrap_err();
        let WorkerErr::Timeout { waited, .. } = err else {
            panic!("expected a timeout, got {err}");
        };
        assert!(waited.abs_diff(Duration::from_millis(1)) < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_deadline_still_accepts_the_reply() {
        let policy = RequestSpec {
            timeout_ms: 1,
            retries: None,
            backoff: 1e300,
        };
        let (mut client, (_sv_rx, mut sv_tx)) = client_pair(policy);

        let server = async move {
            time::sleep(Duration::from_secs(5)).await;
            sv_tx.send(&Msg::Ack).await
        };

        let (res, served) = tokio::join!(client.step(), server);
        served.unwrap();
        res.unwrap();
    }
}
