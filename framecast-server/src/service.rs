//! Server loop.
//!
//! Paces the stand-in core at the configured frame rate and feeds every
//! frame through one [`StreamingSession`]. Streaming failures are logged
//! and leave the loop running without a video sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use framecast_core::{FrameSink, RelaySink, StreamingSession, TransportServer};

use crate::config::{Backend, ServerConfig};
use crate::pattern::PatternCore;

// ── StreamService ────────────────────────────────────────────────

/// The top-level streaming service.
pub struct StreamService {
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl StreamService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Construct the configured backend. Must run inside the runtime.
    pub fn build_sink(&self) -> Result<Box<dyn FrameSink>, Box<dyn std::error::Error>> {
        let sink: Box<dyn FrameSink> = match self.config.network.backend {
            Backend::Direct => Box::new(TransportServer::new(self.config.transport_config()?)),
            Backend::Relay => Box::new(RelaySink::from_current(self.config.relay_addr()?)?),
        };
        info!(backend = sink.name(), "frame sink selected");
        Ok(sink)
    }

    /// Run the frame loop until stopped.
    ///
    /// Returns the number of frames produced.
    pub async fn run(&self) -> Result<u64, Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let sink = self.build_sink()?;
        let mut session = StreamingSession::new(self.config.stream_settings(), sink);
        match session.configure(self.config.source_geometry()) {
            Ok(target) => info!(
                width = target.width,
                height = target.height,
                pitch = target.pitch,
                "render target ready"
            ),
            Err(e) => warn!("continuing without a video sink: {e}"),
        }

        let mut core = PatternCore::new();
        let mut ticker = time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames: u64 = 0;

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = Self::wait_for_stop(&self.running) => break,
            }

            if let Some(target) = session.render_target() {
                core.render(target, session.render_pixels_mut());
            }
            let report = session.frame_produced();
            if report.broadcast.dropped > 0 {
                debug!(
                    dropped = report.broadcast.dropped,
                    clients = report.clients,
                    "viewers dropped"
                );
            }
            frames += 1;
        }

        session.stop();
        self.running.store(false, Ordering::SeqCst);
        info!(frames, "streaming service stopped");
        Ok(frames)
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback_config() -> ServerConfig {
        let mut cfg = ServerConfig::default();
        cfg.network.listen_addr = "127.0.0.1".into();
        cfg.network.port = 0;
        cfg.source.fps = 200;
        cfg
    }

    #[test]
    fn service_creates_with_defaults() {
        let svc = StreamService::new(ServerConfig::default());
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn runs_until_stopped() {
        let svc = Arc::new(StreamService::new(loopback_config()));
        let handle = svc.stop_handle();

        let task = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.run().await.map_err(|e| e.to_string()) }
        });

        time::sleep(Duration::from_millis(200)).await;
        assert!(svc.is_running());
        handle.store(false, Ordering::SeqCst);

        let frames = time::timeout(Duration::from_secs(5), task)
            .await
            .expect("timeout")
            .unwrap()
            .unwrap();
        assert!(frames > 0);
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn bad_relay_address_is_rejected() {
        let mut cfg = loopback_config();
        cfg.network.backend = Backend::Relay;
        cfg.network.relay_addr = "nowhere".into();
        assert!(StreamService::new(cfg).build_sink().is_err());
    }
}
