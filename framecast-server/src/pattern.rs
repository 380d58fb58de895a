//! Stand-in emulation core: a test pattern.
//!
//! Draws scrolling RGB565 colour bars into whatever render target the
//! session hands out, so the server can run without a real emulator.

use framecast_core::RenderTarget;
use framecast_core::pixel::pack;

/// SMPTE-ish bar colours.
const BARS: [u16; 8] = [
    pack(255, 255, 255),
    pack(255, 255, 0),
    pack(0, 255, 255),
    pack(0, 255, 0),
    pack(255, 0, 255),
    pack(255, 0, 0),
    pack(0, 0, 255),
    pack(0, 0, 0),
];

/// Test-pattern frame producer.
#[derive(Debug, Default)]
pub struct PatternCore {
    frame: u64,
}

impl PatternCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Render the next frame into `pixels`, laid out as `target`.
    ///
    /// Does nothing when `pixels` does not cover the target, e.g. after
    /// streaming was disabled.
    pub fn render(&mut self, target: RenderTarget, pixels: &mut [u16]) {
        let width = target.width as usize;
        let rows = target.height as usize;
        if width == 0 || pixels.len() < width * rows {
            return;
        }

        let bar_width = width.div_ceil(BARS.len()).max(1);
        let shift = (self.frame as usize) % width;
        for row in pixels.chunks_exact_mut(width).take(rows) {
            for (x, px) in row.iter_mut().enumerate() {
                *px = BARS[((x + shift) % width) / bar_width % BARS.len()];
            }
        }
        self.frame += 1;
    }
}

// ── Tests ────────────────────────────────────────────────────────
