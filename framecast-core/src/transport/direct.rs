//! Direct-socket transport: a non-blocking TCP listener with a bounded set
//! of viewers.
//!
//! Every accepted viewer receives the handshake record in the same poll step
//! that accepts it, so the handshake always precedes its first frame.
//!
//! Client sockets are non-blocking. A frame that cannot be written at all is
//! skipped for that client; a frame that is written partially is finished
//! from a per-client backlog before the client may take another frame, so a
//! viewer never sees a torn frame.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::preamble::FrameGeometry;
use crate::registry::{ClientRegistry, DEFAULT_CAPACITY};
use crate::transport::{BroadcastReport, DEFAULT_PORT, FrameSink, SinkState};

// ── TransportConfig ──────────────────────────────────────────────

/// Listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub listen_addr: SocketAddr,
    /// Registry capacity; further viewers are accepted and closed.
    pub max_clients: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_clients: DEFAULT_CAPACITY,
        }
    }
}

// ── ClientConnection ─────────────────────────────────────────────

/// Result of offering one frame to one client.
#[derive(Debug)]
pub(crate) enum Delivery {
    /// The whole frame was written.
    Sent,
    /// Part of the frame was written; the rest is backlogged.
    Queued,
    /// Nothing could be written this tick.
    Skipped,
    /// The client is gone.
    Closed(io::Error),
}

/// A registered viewer.
#[derive(Debug)]
pub(crate) struct ClientConnection<S> {
    stream: S,
    peer: SocketAddr,
    backlog: Vec<u8>,
}

impl ClientConnection<TcpStream> {
    fn accept(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, peer))
    }
}

impl<S: Write> ClientConnection<S> {
    pub(crate) fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            backlog: Vec::new(),
        }
    }

    /// Write the handshake; whatever does not fit now is backlogged.
    pub(crate) fn handshake(&mut self, preamble: &[u8]) -> io::Result<()> {
        let written = write_available(&mut self.stream, preamble)?;
        self.backlog.extend_from_slice(&preamble[written..]);
        Ok(())
    }

    /// Offer one frame.
    pub(crate) fn deliver(&mut self, frame: &[u8]) -> Delivery {
        match self.flush_backlog() {
            Ok(true) => {}
            Ok(false) => return Delivery::Skipped,
            Err(e) => return Delivery::Closed(e),
        }

        match write_available(&mut self.stream, frame) {
            Ok(n) if n == frame.len() => Delivery::Sent,
            Ok(0) => Delivery::Skipped,
            Ok(n) => {
                self.backlog.extend_from_slice(&frame[n..]);
                Delivery::Queued
            }
            Err(e) => Delivery::Closed(e),
        }
    }

    /// `true` once nothing is left to send.
    fn flush_backlog(&mut self) -> io::Result<bool> {
        if self.backlog.is_empty() {
            return Ok(true);
        }
        let written = write_available(&mut self.stream, &self.backlog)?;
        self.backlog.drain(..written);
        Ok(self.backlog.is_empty())
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn pending_bytes(&self) -> usize {
        self.backlog.len()
    }
}

/// Write until done or the socket would block. A zero-length write is a
/// disconnect.
fn write_available<S: Write>(stream: &mut S, data: &[u8]) -> io::Result<usize> {
    let mut offset = 0;
    while offset < data.len() {
        match stream.write(&data[offset..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => offset += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(offset)
}

/// Offer `frame` to every client, reaping the ones whose write failed.
pub(crate) fn broadcast_to<S: Write>(
    clients: &mut ClientRegistry<ClientConnection<S>>,
    frame: &[u8],
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let dropped = clients.sweep(|client| match client.deliver(frame) {
        Delivery::Sent | Delivery::Queued => {
            report.delivered += 1;
            true
        }
        Delivery::Skipped => {
            report.skipped += 1;
            true
        }
        Delivery::Closed(e) => {
            let err = StreamError::ClientWrite {
                peer: client.peer().to_string(),
                reason: e.to_string(),
            };
            info!(class = ?err.class(), "{err}");
            false
        }
    });
    report.dropped = dropped.len();
    report
}

// ── TransportServer ──────────────────────────────────────────────

/// Direct-socket [`FrameSink`].
pub struct TransportServer {
    config: TransportConfig,
    listener: Option<TcpListener>,
    clients: ClientRegistry<ClientConnection<TcpStream>>,
    preamble: Option<[u8; FrameGeometry::SIZE]>,
    state: SinkState,
}

impl TransportServer {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            listener: None,
            clients: ClientRegistry::new(config.max_clients),
            preamble: None,
            state: SinkState::Unbound,
        }
    }

    /// Bound address, once listening (resolves port `0`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Bytes still owed to clients from partially written frames.
    pub fn pending_bytes(&self) -> usize {
        self.clients.iter().map(ClientConnection::pending_bytes).sum()
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.clients.is_full() {
            warn!(%peer, "ignoring new connection; maxed out");
            return;
        }
        let Some(preamble) = self.preamble else {
            return;
        };

        let mut client = match ClientConnection::accept(stream, peer) {
            Ok(c) => c,
            Err(e) => {
                warn!(%peer, "failed to configure client socket: {e}");
                return;
            }
        };

        debug!(%peer, "writing buffer data");
        if let Err(e) = client.handshake(&preamble) {
            warn!(%peer, "error writing handshake: {e}");
            return;
        }

        info!(%peer, "new connection");
        if let Err(rejected) = self.clients.insert(client) {
            warn!(peer = %rejected.peer(), "ignoring new connection; maxed out");
        }
    }
}

impl Default for TransportServer {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

fn bind_nonblocking(addr: SocketAddr) -> Result<TcpListener, StreamError> {
    let listener = TcpListener::bind(addr).map_err(|source| StreamError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| StreamError::Bind { addr, source })?;
    Ok(listener)
}

impl FrameSink for TransportServer {
    fn name(&self) -> &'static str {
        "direct-socket"
    }

    fn start(&mut self, preamble: FrameGeometry) -> Result<(), StreamError> {
        if self.state == SinkState::Listening {
            self.stop();
        }

        let addr = self.config.listen_addr;
        let listener = match bind_nonblocking(addr) {
            Ok(l) => l,
            Err(e) => {
                self.state = SinkState::Stopped;
                return Err(e);
            }
        };

        info!(addr = %listener.local_addr().unwrap_or(addr), "listening");
        self.listener = Some(listener);
        self.preamble = Some(preamble.encode());
        self.state = SinkState::Listening;
        Ok(())
    }

    fn poll_once(&mut self) -> Result<(), StreamError> {
        let Some(listener) = self.listener.as_ref() else {
            return Err(StreamError::NotListening);
        };

        match listener.accept() {
            Ok((stream, peer)) => {
                self.admit(stream, peer);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::ConnectionReset
                ) =>
            {
                debug!("transient accept failure: {e}");
                Ok(())
            }
            Err(e) => Err(StreamError::Poll(e)),
        }
    }

    fn broadcast(&mut self, frame: &[u8]) -> BroadcastReport {
        if self.state != SinkState::Listening {
            return BroadcastReport::default();
        }
        broadcast_to(&mut self.clients, frame)
    }

    fn stop(&mut self) {
        if !self.clients.is_empty() {
            info!("closing client sockets");
        }
        self.clients.drain().for_each(drop);
        if self.listener.take().is_some() {
            info!("closing server socket");
        }
        self.preamble = None;
        self.state = SinkState::Stopped;
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        TransportServer::local_addr(self)
    }
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ────────────────────────────────────────────────────────
