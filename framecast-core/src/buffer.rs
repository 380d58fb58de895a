//! Render and output buffer ownership.
//!
//! The render buffer is what the emulation core draws into. When the plan
//! scales, a distinct output buffer receives the downsampled frame;
//! otherwise the output *is* the render buffer ([`OutputTarget::Aliased`]).

use tracing::{debug, info};

use crate::error::StreamError;
use crate::geometry::{FrameSize, GeometryPlan};
use crate::pixel::{BITS_PER_PIXEL, BYTES_PER_PIXEL};

// ── OutputTarget ─────────────────────────────────────────────────

/// Where the transmitted frame lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Output dimensions equal render dimensions; no copy is made.
    Aliased,
    /// A separately allocated, downsampled buffer.
    Distinct(Vec<u16>),
}

// ── RenderTarget ─────────────────────────────────────────────────

/// What the emulation core must be told before it renders its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Row length in pixels as laid out in memory.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Bytes per row.
    pub pitch: usize,
    pub bits_per_pixel: u32,
}

impl RenderTarget {
    pub fn len(&self) -> usize {
        self.pitch * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── FrameBuffers ─────────────────────────────────────────────────

/// Owner of the render buffer and, when scaling, the output buffer.
#[derive(Debug)]
pub struct FrameBuffers {
    render: Vec<u16>,
    output: OutputTarget,
    render_layout: FrameSize,
    output_layout: FrameSize,
}

impl FrameBuffers {
    /// No buffers allocated yet.
    pub fn new() -> Self {
        Self {
            render: Vec::new(),
            output: OutputTarget::Aliased,
            render_layout: FrameSize::default(),
            output_layout: FrameSize::default(),
        }
    }

    /// (Re)allocate zeroed buffers for `plan`.
    ///
    /// Previous buffers are released first. On failure nothing stays
    /// allocated.
    pub fn configure(
        &mut self,
        plan: &GeometryPlan,
        bytes_per_pixel: usize,
    ) -> Result<RenderTarget, StreamError> {
        self.teardown();

        if bytes_per_pixel != BYTES_PER_PIXEL {
            return Err(StreamError::UnsupportedDepth(bytes_per_pixel));
        }

        let render_layout = plan.render_layout();
        let output_layout = plan.output_layout();
        if render_layout.is_empty() || output_layout.is_empty() {
            return Err(StreamError::InvalidGeometry(format!(
                "render {render_layout}, output {output_layout}"
            )));
        }

        debug!("setting up render buffer");
        let render = alloc_zeroed("render", render_layout.pixel_count())?;
        info!(
            "allocated render buffer of size ({})",
            render.len() * BYTES_PER_PIXEL
        );

        let output = if plan.is_scaled() {
            let output = alloc_zeroed("output", output_layout.pixel_count())?;
            info!(
                "allocated output buffer of size ({})",
                output.len() * BYTES_PER_PIXEL
            );
            OutputTarget::Distinct(output)
        } else {
            OutputTarget::Aliased
        };

        self.render = render;
        self.output = output;
        self.render_layout = render_layout;
        self.output_layout = output_layout;

        Ok(self.render_target())
    }

    /// Release both buffers. Idempotent.
    pub fn teardown(&mut self) {
        if self.is_allocated() {
            debug!("destroying buffers");
        }
        self.output = OutputTarget::Aliased;
        self.render = Vec::new();
        self.render_layout = FrameSize::default();
        self.output_layout = FrameSize::default();
    }

    pub fn is_allocated(&self) -> bool {
        !self.render.is_empty()
    }

    /// Whether the output buffer is the render buffer.
    pub fn is_aliased(&self) -> bool {
        matches!(self.output, OutputTarget::Aliased)
    }

    pub fn output_target(&self) -> &OutputTarget {
        &self.output
    }

    /// Geometry the emulation core renders into.
    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            width: self.render_layout.width,
            height: self.render_layout.height,
            pitch: self.render_layout.width as usize * BYTES_PER_PIXEL,
            bits_per_pixel: BITS_PER_PIXEL,
        }
    }

    /// Render buffer, row-major as laid out in memory.
    pub fn render_layout(&self) -> FrameSize {
        self.render_layout
    }

    /// Output buffer, row-major as laid out in memory.
    pub fn output_layout(&self) -> FrameSize {
        self.output_layout
    }

    /// Writable render region handed to the emulation core.
    pub fn render_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.render)
    }

    pub fn render_pixels(&self) -> &[u16] {
        &self.render
    }

    pub fn render_pixels_mut(&mut self) -> &mut [u16] {
        &mut self.render
    }

    /// Pixels that are transmitted.
    pub fn output_pixels(&self) -> &[u16] {
        match &self.output {
            OutputTarget::Aliased => &self.render,
            OutputTarget::Distinct(buf) => buf,
        }
    }

    /// Bytes that are transmitted.
    pub fn output_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.output_pixels())
    }

    /// Render source and distinct output destination, for downsampling.
    ///
    /// `None` when aliased.
    pub fn scaling_pair(&mut self) -> Option<(&[u16], &mut [u16])> {
        match &mut self.output {
            OutputTarget::Aliased => None,
            OutputTarget::Distinct(out) => Some((&self.render, out.as_mut_slice())),
        }
    }
}

impl Default for FrameBuffers {
    fn default() -> Self {
        Self::new()
    }
}

fn alloc_zeroed(buffer: &'static str, pixels: usize) -> Result<Vec<u16>, StreamError> {
    let bytes = pixels.saturating_mul(BYTES_PER_PIXEL);
    let mut buf = Vec::new();
    buf.try_reserve_exact(pixels)
        .map_err(|_| StreamError::Allocation { buffer, bytes })?;
    buf.resize(pixels, 0);
    Ok(buf)
}

// ── Tests ────────────────────────────────────────────────────────
