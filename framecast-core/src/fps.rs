//! Server-side frame rate meter.
//!
//! Counts frames and, once per elapsed one-second window on a monotonic
//! clock, reports `frames / elapsed_seconds` and starts a new window.
//! Purely observational; it never touches the stream.

use std::time::{Duration, Instant};

/// Source of monotonic time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Windowed frame counter.
#[derive(Debug)]
pub struct FpsMeter<C = MonotonicClock> {
    clock: C,
    window: Duration,
    window_start: Instant,
    frames: u32,
    last_fps: Option<f64>,
}

impl FpsMeter<MonotonicClock> {
    /// One-second window on the system monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock)
    }
}

impl Default for FpsMeter<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FpsMeter<C> {
    pub fn with_clock(clock: C) -> Self {
        let window_start = clock.now();
        Self {
            clock,
            window: Duration::from_secs(1),
            window_start,
            frames: 0,
            last_fps: None,
        }
    }

    /// Count one frame. Returns the rate when a window closes.
    pub fn record_frame(&mut self) -> Option<f64> {
        self.frames += 1;

        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Frames counted in the current window.
    pub fn frames_in_window(&self) -> u32 {
        self.frames
    }

    /// Rate reported by the last closed window.
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}

// ── Tests ────────────────────────────────────────────────────────
