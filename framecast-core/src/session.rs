//! One emulation session's streaming state.
//!
//! A [`StreamingSession`] owns everything the stream needs: the settings,
//! the resolved geometry, both frame buffers, the pump and the sink.
//!
//! ```text
//! new(settings, sink)
//!        │
//!        ▼
//! configure(source) ── validate ─► plan ─► buffers ─► preamble ─► sink.start
//!        │                      (any failure: teardown, streaming off)
//!        ▼
//! render_buffer_mut() ◄── core draws ──► frame_produced()   (once per frame)
//!        │
//!        ▼
//! configure(other source)  or  stop() / drop
//! ```
//!
//! Nothing here fails the emulation: errors are logged, returned for the
//! caller to inspect, and leave the session without a video sink.

use std::net::SocketAddr;

use tracing::{error, info, warn};

use crate::buffer::{FrameBuffers, RenderTarget};
use crate::config::StreamSettings;
use crate::error::StreamError;
use crate::geometry::{self, GeometryPlan, SourceGeometry};
use crate::pixel::BYTES_PER_PIXEL;
use crate::preamble::FrameGeometry;
use crate::pump::{FramePump, PumpReport};
use crate::transport::{FrameSink, SinkState};

/// Streaming state for one emulation session.
pub struct StreamingSession {
    settings: StreamSettings,
    sink: Box<dyn FrameSink>,
    buffers: FrameBuffers,
    pump: FramePump,
    plan: Option<GeometryPlan>,
    preamble: Option<FrameGeometry>,
    streaming: bool,
}

impl StreamingSession {
    /// Session delivering to `sink`. Nothing is allocated or bound until
    /// [`configure`](Self::configure).
    pub fn new(settings: StreamSettings, sink: Box<dyn FrameSink>) -> Self {
        Self {
            settings,
            sink,
            buffers: FrameBuffers::new(),
            pump: FramePump::new(settings.show_fps),
            plan: None,
            preamble: None,
            streaming: false,
        }
    }

    /// Set up buffers and start streaming for `source`.
    ///
    /// Any previous configuration is torn down first, so every call starts
    /// a fresh handshake. On error streaming stays off until the next
    /// successful call.
    pub fn configure(&mut self, source: SourceGeometry) -> Result<RenderTarget, StreamError> {
        self.shutdown();

        match self.try_configure(source) {
            Ok(target) => {
                self.streaming = true;
                Ok(target)
            }
            Err(e) => {
                error!(class = ?e.class(), "streaming disabled: {e}");
                self.shutdown();
                Err(e)
            }
        }
    }

    fn try_configure(&mut self, source: SourceGeometry) -> Result<RenderTarget, StreamError> {
        self.settings.scale.validate()?;

        let plan = geometry::plan(&source, &self.settings.scale)?;
        if plan.is_scaled() {
            info!(render = %plan.render, output = %plan.output, "scaling output");
        }

        let target = self.buffers.configure(&plan, BYTES_PER_PIXEL)?;
        let preamble = FrameGeometry::from_plan(&plan, self.settings.flip_vertical)?;

        self.sink.start(preamble)?;
        info!(
            sink = self.sink.name(),
            width = preamble.width,
            height = preamble.height,
            total_bytes = preamble.total_bytes,
            "streaming started"
        );

        self.plan = Some(plan);
        self.preamble = Some(preamble);
        Ok(target)
    }

    /// Run one frame through the pump.
    pub fn frame_produced(&mut self) -> PumpReport {
        if !self.streaming {
            return PumpReport::default();
        }

        match self.pump.tick(&mut self.buffers, &mut self.sink) {
            Ok(report) => {
                if !report.streaming {
                    warn!(sink = self.sink.name(), "sink no longer listening");
                    self.streaming = false;
                }
                report
            }
            Err(e) => {
                error!(class = ?e.class(), "streaming stopped: {e}");
                self.streaming = false;
                PumpReport::default()
            }
        }
    }

    /// Writable render region, empty while unconfigured.
    pub fn render_buffer_mut(&mut self) -> &mut [u8] {
        self.buffers.render_bytes_mut()
    }

    /// Render region as pixels.
    pub fn render_pixels_mut(&mut self) -> &mut [u16] {
        self.buffers.render_pixels_mut()
    }

    /// Geometry the core renders into, once configured.
    pub fn render_target(&self) -> Option<RenderTarget> {
        self.buffers
            .is_allocated()
            .then(|| self.buffers.render_target())
    }

    pub fn buffers(&self) -> &FrameBuffers {
        &self.buffers
    }

    pub fn plan(&self) -> Option<&GeometryPlan> {
        self.plan.as_ref()
    }

    /// Handshake sent to every viewer of this configuration.
    pub fn preamble(&self) -> Option<&FrameGeometry> {
        self.preamble.as_ref()
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn sink_state(&self) -> SinkState {
        self.sink.state()
    }

    pub fn client_count(&self) -> usize {
        self.sink.client_count()
    }

    /// Where viewers connect, for a listening sink.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.sink.local_addr()
    }

    /// End streaming and release the buffers. Idempotent.
    pub fn stop(&mut self) {
        if self.streaming {
            info!(sink = self.sink.name(), "stopping stream");
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.sink.state() == SinkState::Listening {
            self.sink.stop();
        }
        self.buffers.teardown();
        self.plan = None;
        self.preamble = None;
        self.streaming = false;
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Dimensions, ScaleConfig, ScaleMode};
    use crate::error::{ConfigError, ErrorClass};
    use crate::geometry::FrameSize;
    use crate::transport::{TransportConfig, TransportServer};

    fn loopback() -> Box<dyn FrameSink> {
        Box::new(TransportServer::new(TransportConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            max_clients: 5,
        }))
    }

    fn scaled_settings(w: u32, h: u32) -> StreamSettings {
        StreamSettings {
            scale: ScaleConfig::shortest_x_aspect(Dimensions {
                width: w,
                height: h,
            }),
            ..StreamSettings::default()
        }
    }

    #[test]
    fn unscaled_session_aliases_and_listens() {
        let mut session = StreamingSession::new(StreamSettings::default(), loopback());
        let target = session
            .configure(SourceGeometry::landscape(320, 240, 4, 3))
            .unwrap();

        assert_eq!(target.pitch, 640);
        assert_eq!(target.bits_per_pixel, 16);
        assert_eq!(session.render_buffer_mut().len(), 320 * 240 * 2);
        assert!(session.buffers().is_aliased());
        assert!(session.is_streaming());
        assert!(session.local_addr().is_some());

        let preamble = session.preamble().unwrap();
        assert_eq!(preamble.total_bytes, preamble.stride_bytes * preamble.height);

        let report = session.frame_produced();
        assert!(report.streaming);
        assert!(!report.scaled);
        assert_eq!(report.clients, 0);
    }

    #[test]
    fn scaled_session_downsamples_each_frame() {
        let mut session = StreamingSession::new(scaled_settings(320, 240), loopback());
        session
            .configure(SourceGeometry::landscape(384, 224, 4, 3))
            .unwrap();

        assert!(!session.buffers().is_aliased());
        assert_eq!(session.plan().unwrap().output, FrameSize::new(298, 224));
        assert!(session.frame_produced().scaled);
    }

    #[test]
    fn rotated_scaled_session_transposes_both_buffers() {
        let colour = crate::pixel::pack(24, 200, 96);
        let mut session = StreamingSession::new(scaled_settings(160, 120), loopback());
        let portrait = SourceGeometry {
            rotated: true,
            ..SourceGeometry::landscape(224, 320, 3, 4)
        };
        let target = session.configure(portrait).unwrap();

        // The core writes rows of `height` pixels.
        assert_eq!((target.width, target.height), (320, 224));
        assert_eq!(target.pitch, 640);

        let preamble = *session.preamble().unwrap();
        assert_eq!((preamble.width, preamble.height), (298, 224));
        assert_eq!(preamble.stride_bytes, 298 * 2);
        assert_eq!(preamble.total_bytes, preamble.stride_bytes * preamble.height);
        assert_eq!(
            preamble.attribute_flags,
            crate::preamble::AttributeFlags::ROTATE_180
        );
        assert_eq!(
            session.buffers().output_bytes().len(),
            preamble.frame_len()
        );

        session.render_pixels_mut().fill(colour);
        assert!(session.frame_produced().scaled);
        assert!(session.buffers().output_pixels().iter().all(|&p| p == colour));
    }

    #[test]
    fn scale_without_dimensions_disables_streaming_only() {
        let settings = StreamSettings {
            scale: ScaleConfig {
                mode: ScaleMode::ShortestXAspect,
                landscape_width: 0,
                landscape_height: 0,
            },
            ..StreamSettings::default()
        };
        let mut session = StreamingSession::new(settings, loopback());

        let err = session
            .configure(SourceGeometry::landscape(320, 240, 4, 3))
            .unwrap_err();
        assert!(matches!(
            err,
            StreamError::Config(ConfigError::ScaleWithoutDimensions)
        ));
        assert_eq!(err.class(), ErrorClass::Config);
        assert!(!session.is_streaming());
        assert!(session.render_target().is_none());
        assert_eq!(session.sink_state(), SinkState::Unbound);
        assert_eq!(session.frame_produced(), PumpReport::default());
    }

    #[test]
    fn bind_failure_tears_down_buffers() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let sink = Box::new(TransportServer::new(TransportConfig {
            listen_addr: taken.local_addr().unwrap(),
            max_clients: 5,
        }));
        let mut session = StreamingSession::new(StreamSettings::default(), sink);

        let err = session
            .configure(SourceGeometry::landscape(64, 32, 2, 1))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Transport);
        assert_eq!(session.sink_state(), SinkState::Stopped);
        assert!(!session.buffers().is_allocated());
        assert!(session.render_buffer_mut().is_empty());
        assert!(!session.is_streaming());
    }

    #[test]
    fn reconfigure_replaces_geometry() {
        let mut session = StreamingSession::new(StreamSettings::default(), loopback());
        session
            .configure(SourceGeometry::landscape(320, 240, 4, 3))
            .unwrap();
        let first = *session.preamble().unwrap();

        let rotated = SourceGeometry {
            rotated: true,
            ..SourceGeometry::landscape(224, 256, 3, 4)
        };
        let target = session.configure(rotated).unwrap();
        let second = *session.preamble().unwrap();

        assert_ne!(first, second);
        // Rotated: the core writes rows of `height` pixels.
        assert_eq!(target.width, 256);
        assert_eq!(second.width, 256);
        assert_eq!(second.height, 224);
        assert!(session.is_streaming());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut session = StreamingSession::new(StreamSettings::default(), loopback());
        session
            .configure(SourceGeometry::landscape(16, 16, 1, 1))
            .unwrap();
        session.stop();
        session.stop();
        assert_eq!(session.sink_state(), SinkState::Stopped);
        assert!(session.render_target().is_none());
        assert!(!session.frame_produced().streaming);
    }
}
