//! Frame sinks: where finished frames go.
//!
//! The session only talks to the [`FrameSink`] capability, so geometry,
//! buffers and scaling never depend on the backend in use.
//!
//! | Backend              | Purpose                                          |
//! |----------------------|--------------------------------------------------|
//! | [`TransportServer`]  | Direct sockets: listen, handshake, broadcast     |
//! | [`RelaySink`]        | Delegate fan-out to an upstream relay over TCP   |
//!
//! ## Lifecycle
//!
//! ```text
//! Unbound ──start()──► Listening ──poll_once()/broadcast()──► ...
//!    │                     │
//!    ├──── start failure   │
//!    └──────stop()─────────┴──── poll failure ────► Stopped
//! ```

pub mod direct;
pub mod relay;

pub use direct::{TransportConfig, TransportServer};
pub use relay::RelaySink;

use std::net::SocketAddr;

use crate::error::StreamError;
use crate::preamble::FrameGeometry;

/// Standard TCP port viewers connect to.
pub const DEFAULT_PORT: u16 = 3500;

// ── SinkState ────────────────────────────────────────────────────

/// Lifecycle of a sink within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Never started.
    Unbound,
    /// Accepting viewers and broadcasting.
    Listening,
    /// Shut down; streaming is off for the rest of the session.
    Stopped,
}

// ── BroadcastReport ──────────────────────────────────────────────

/// Outcome of one frame's delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Clients that received the whole frame.
    pub delivered: usize,
    /// Clients that could not take the frame this tick.
    pub skipped: usize,
    /// Clients removed because their write failed.
    pub dropped: usize,
}

// ── FrameSink ────────────────────────────────────────────────────

/// Destination of the per-frame broadcast.
///
/// Every method is non-blocking: a sink is driven from the emulation
/// frame loop and must never stall it.
pub trait FrameSink: Send {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Begin accepting viewers; every viewer receives `preamble` first.
    fn start(&mut self, preamble: FrameGeometry) -> Result<(), StreamError>;

    /// Check once, without blocking, for new viewers.
    ///
    /// An error means the sink is unusable; the caller stops it.
    fn poll_once(&mut self) -> Result<(), StreamError>;

    /// Deliver one frame to every registered viewer.
    fn broadcast(&mut self, frame: &[u8]) -> BroadcastReport;

    /// Close every viewer and the listener. Idempotent.
    fn stop(&mut self);

    fn state(&self) -> SinkState;

    /// Viewers currently registered.
    fn client_count(&self) -> usize;

    /// Address viewers connect to, when the sink listens itself.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn start(&mut self, preamble: FrameGeometry) -> Result<(), StreamError> {
        (**self).start(preamble)
    }

    fn poll_once(&mut self) -> Result<(), StreamError> {
        (**self).poll_once()
    }

    fn broadcast(&mut self, frame: &[u8]) -> BroadcastReport {
        (**self).broadcast(frame)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn state(&self) -> SinkState {
        (**self).state()
    }

    fn client_count(&self) -> usize {
        (**self).client_count()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        (**self).local_addr()
    }
}
