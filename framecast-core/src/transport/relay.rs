//! Relay-delegate transport.
//!
//! Instead of serving viewers itself, the sink pushes the stream to an
//! upstream relay that does the fan-out. One tokio task owns the relay
//! connection; the frame loop hands it frames through a bounded channel and
//! never waits on the network.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures::{FutureExt, SinkExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use crate::codec::{StreamCodec, StreamMessage};
use crate::error::StreamError;
use crate::preamble::FrameGeometry;
use crate::transport::{BroadcastReport, FrameSink, SinkState};

/// Frames buffered between the frame loop and the relay task.
const DEFAULT_QUEUE_DEPTH: usize = 4;

/// [`FrameSink`] that forwards the stream to a relay.
pub struct RelaySink {
    relay_addr: SocketAddr,
    runtime: Handle,
    queue_depth: usize,
    tx: Option<mpsc::Sender<Bytes>>,
    task: Option<JoinHandle<Result<(), StreamError>>>,
    connected: Arc<AtomicBool>,
    state: SinkState,
}

impl RelaySink {
    /// Relay at `relay_addr`, driven on `runtime`.
    pub fn new(relay_addr: SocketAddr, runtime: Handle) -> Self {
        Self {
            relay_addr,
            runtime,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            tx: None,
            task: None,
            connected: Arc::new(AtomicBool::new(false)),
            state: SinkState::Unbound,
        }
    }

    /// Relay driven on the runtime of the calling context.
    pub fn from_current(relay_addr: SocketAddr) -> Result<Self, StreamError> {
        let runtime = Handle::try_current()
            .map_err(|e| StreamError::RelayUnavailable(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(relay_addr, runtime))
    }

    /// Override how many frames may wait for the relay (at least 1).
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn relay_addr(&self) -> SocketAddr {
        self.relay_addr
    }

    /// Whether the relay connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn run_relay(
    addr: SocketAddr,
    preamble: FrameGeometry,
    mut rx: mpsc::Receiver<Bytes>,
    connected: Arc<AtomicBool>,
) -> Result<(), StreamError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    connected.store(true, Ordering::SeqCst);
    info!(%addr, "connected to relay");

    let mut framed = FramedWrite::new(stream, StreamCodec::new());
    let result = async {
        framed.send(StreamMessage::Preamble(preamble)).await?;
        while let Some(frame) = rx.recv().await {
            framed.send(StreamMessage::Frame(frame)).await?;
        }
        Ok::<(), StreamError>(())
    }
    .await;

    connected.store(false, Ordering::SeqCst);
    result
}

impl FrameSink for RelaySink {
    fn name(&self) -> &'static str {
        "relay-delegate"
    }

    fn start(&mut self, preamble: FrameGeometry) -> Result<(), StreamError> {
        if self.state == SinkState::Listening {
            self.stop();
        }

        let (tx, rx) = mpsc::channel(self.queue_depth);
        let connected = Arc::clone(&self.connected);
        let addr = self.relay_addr;
        self.task = Some(
            self.runtime
                .spawn(async move { run_relay(addr, preamble, rx, connected).await }),
        );
        self.tx = Some(tx);
        self.state = SinkState::Listening;
        debug!(%addr, "relay task spawned");
        Ok(())
    }

    fn poll_once(&mut self) -> Result<(), StreamError> {
        let Some(task) = self.task.as_mut() else {
            return Err(StreamError::NotListening);
        };
        if !task.is_finished() {
            return Ok(());
        }

        let outcome = task.now_or_never();
        self.task = None;
        let reason = match outcome {
            Some(Ok(Ok(()))) => "relay connection closed".to_string(),
            Some(Ok(Err(e))) => e.to_string(),
            Some(Err(join)) => join.to_string(),
            None => "relay task vanished".to_string(),
        };
        Err(StreamError::RelayUnavailable(reason))
    }

    fn broadcast(&mut self, frame: &[u8]) -> BroadcastReport {
        let Some(tx) = self.tx.as_ref() else {
            return BroadcastReport::default();
        };

        let mut report = BroadcastReport::default();
        match tx.try_send(Bytes::copy_from_slice(frame)) {
            Ok(()) => report.delivered = 1,
            Err(TrySendError::Full(_)) => report.skipped = 1,
            Err(TrySendError::Closed(_)) => {
                warn!(addr = %self.relay_addr, "relay channel closed");
                report.dropped = 1;
            }
        }
        report
    }

    fn stop(&mut self) {
        self.tx = None;
        if let Some(task) = self.task.take() {
            info!(addr = %self.relay_addr, "closing relay connection");
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        self.state = SinkState::Stopped;
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn client_count(&self) -> usize {
        usize::from(self.is_connected())
    }
}

impl Drop for RelaySink {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ────────────────────────────────────────────────────────
