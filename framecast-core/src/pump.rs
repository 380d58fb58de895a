//! Per-frame driver.
//!
//! One [`tick`](FramePump::tick) per rendered frame, in this order:
//!
//! 1. downsample the render buffer into the output buffer (if scaled),
//! 2. `poll_once()`: accept at most one viewer and send it the handshake,
//! 3. `broadcast()` the output buffer to every registered viewer,
//!
//! and, when enabled, feed the FPS meter. Accept-and-handshake always runs
//! ahead of the broadcast, so a new viewer never sees a frame first.

use tracing::{error, info};

use crate::buffer::FrameBuffers;
use crate::downsample::downsample;
use crate::error::StreamError;
use crate::fps::{Clock, FpsMeter, MonotonicClock};
use crate::transport::{BroadcastReport, FrameSink, SinkState};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PumpReport {
    /// A downsampling pass ran.
    pub scaled: bool,
    pub broadcast: BroadcastReport,
    /// Viewers registered after the broadcast.
    pub clients: usize,
    /// Set when an FPS window closed on this tick.
    pub fps: Option<f64>,
    /// The sink is still live after this tick.
    pub streaming: bool,
}

/// Drives downsampling, polling and broadcast once per frame.
#[derive(Debug)]
pub struct FramePump<C = MonotonicClock> {
    meter: Option<FpsMeter<C>>,
}

impl FramePump<MonotonicClock> {
    pub fn new(show_fps: bool) -> Self {
        Self {
            meter: show_fps.then(FpsMeter::new),
        }
    }
}

impl<C: Clock> FramePump<C> {
    /// Pump that reports FPS from `meter`.
    pub fn with_meter(meter: FpsMeter<C>) -> Self {
        Self { meter: Some(meter) }
    }

    pub fn reports_fps(&self) -> bool {
        self.meter.is_some()
    }

    /// Run one frame.
    ///
    /// A poll failure stops `sink` before the error is returned; the caller
    /// only has to stop calling.
    pub fn tick<S>(
        &mut self,
        buffers: &mut FrameBuffers,
        sink: &mut S,
    ) -> Result<PumpReport, StreamError>
    where
        S: FrameSink + ?Sized,
    {
        let mut report = PumpReport {
            fps: self.record_frame(),
            ..PumpReport::default()
        };

        if sink.state() != SinkState::Listening {
            return Ok(report);
        }

        report.scaled = downsample(buffers)?;

        if let Err(e) = sink.poll_once() {
            error!(sink = sink.name(), "poll failed, shutting down stream: {e}");
            sink.stop();
            return Err(e);
        }

        report.broadcast = sink.broadcast(buffers.output_bytes());
        report.clients = sink.client_count();
        report.streaming = true;
        Ok(report)
    }

    fn record_frame(&mut self) -> Option<f64> {
        let fps = self.meter.as_mut()?.record_frame()?;
        info!(fps = %format_args!("{fps:.2}"), "server frame rate");
        Some(fps)
    }
}

// ── Tests ────────────────────────────────────────────────────────
