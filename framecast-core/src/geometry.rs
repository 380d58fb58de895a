//! Output geometry planning.
//!
//! Pure functions: given the source frame as the emulation core reports it
//! and the session's [`ScaleConfig`], decide the resolution that is actually
//! streamed. The plan is computed once per session and never per frame.
//!
//! ## Aspect formula
//!
//! The aspect ratio `aspect_x:aspect_y` is always read in render-buffer
//! orientation: a derived width is `height * aspect_x / aspect_y` and a
//! derived height is `width * aspect_y / aspect_x`, rotated or not. Rotation
//! only swaps which landscape dimension each axis is compared against.

use tracing::{debug, info};

use crate::config::{ScaleConfig, ScaleMode};
use crate::error::{ConfigError, StreamError};

// ── FrameSize ────────────────────────────────────────────────────

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The same size with the axes exchanged.
    pub const fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── SourceGeometry ───────────────────────────────────────────────

/// What the emulation core reports about the game screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceGeometry {
    /// Visible width in game terms.
    pub width: u32,
    /// Visible height in game terms.
    pub height: u32,
    pub aspect_x: u32,
    pub aspect_y: u32,
    /// Portrait cabinet: the core writes rows of `height` pixels.
    pub rotated: bool,
    /// The game draws its screen upside down.
    pub flipped: bool,
}

impl SourceGeometry {
    /// Landscape source with the given size and aspect.
    pub fn landscape(width: u32, height: u32, aspect_x: u32, aspect_y: u32) -> Self {
        Self {
            width,
            height,
            aspect_x,
            aspect_y,
            rotated: false,
            flipped: false,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

// ── GeometryPlan ─────────────────────────────────────────────────

/// The session's resolved render and output geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPlan {
    /// Render buffer size in game terms.
    pub render: FrameSize,
    /// Output buffer size in game terms.
    pub output: FrameSize,
    pub rotated: bool,
    pub flipped: bool,
}

impl GeometryPlan {
    /// Whether a distinct output buffer and a downsampling pass are needed.
    pub fn is_scaled(&self) -> bool {
        self.render != self.output
    }

    /// Render buffer as laid out in memory (row length first).
    pub fn render_layout(&self) -> FrameSize {
        if self.rotated {
            self.render.transposed()
        } else {
            self.render
        }
    }

    /// Output buffer as laid out in memory (row length first).
    pub fn output_layout(&self) -> FrameSize {
        if self.rotated {
            self.output.transposed()
        } else {
            self.output
        }
    }
}

/// Compute the output geometry for `source` under `scale`.
pub fn plan(source: &SourceGeometry, scale: &ScaleConfig) -> Result<GeometryPlan, StreamError> {
    if source.size().is_empty() {
        return Err(StreamError::InvalidGeometry(format!(
            "source is {}",
            source.size()
        )));
    }

    let output = match scale.mode {
        ScaleMode::None => source.size(),
        ScaleMode::ShortestXAspect => {
            scale.validate()?;
            if source.aspect_x == 0 || source.aspect_y == 0 {
                return Err(ConfigError::InvalidAspect {
                    x: source.aspect_x,
                    y: source.aspect_y,
                }
                .into());
            }
            shortest_x_aspect(source, scale).unwrap_or_else(|| {
                info!("no dedicated output buffer");
                source.size()
            })
        }
    };

    if output != source.size() {
        info!("output buffer: {output}");
    }

    Ok(GeometryPlan {
        render: source.size(),
        output,
        rotated: source.rotated,
        flipped: source.flipped,
    })
}

/// `None` when the source already fits (or the derived axis collapses).
fn shortest_x_aspect(source: &SourceGeometry, scale: &ScaleConfig) -> Option<FrameSize> {
    let (w, h) = (source.width, source.height);
    let width_ratio = source.aspect_x as f32 / source.aspect_y as f32;
    let height_ratio = source.aspect_y as f32 / source.aspect_x as f32;

    let derive_width = || FrameSize::new((h as f32 * width_ratio) as u32, h);
    let derive_height = || FrameSize::new(w, (w as f32 * height_ratio) as u32);

    let size = if !source.rotated {
        if w > scale.landscape_width {
            derive_width()
        } else if h > scale.landscape_height {
            derive_height()
        } else {
            return None;
        }
    } else if h > scale.landscape_width {
        derive_height()
    } else if w > scale.landscape_height {
        derive_width()
    } else {
        return None;
    };

    debug!(source = %source.size(), derived = %size, "shortest-x-aspect");
    (!size.is_empty()).then_some(size)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dimensions;

    fn target(width: u32, height: u32) -> ScaleConfig {
        ScaleConfig::shortest_x_aspect(Dimensions { width, height })
    }

    fn portrait(width: u32, height: u32) -> SourceGeometry {
        SourceGeometry {
            width,
            height,
            aspect_x: 3,
            aspect_y: 4,
            rotated: true,
            flipped: false,
        }
    }

    #[test]
    fn none_mode_keeps_render_size() {
        for (w, h) in [(1, 1), (224, 320), (384, 224), (4096, 7)] {
            let src = SourceGeometry::landscape(w, h, 4, 3);
            let plan = plan(&src, &ScaleConfig::none()).unwrap();
            assert_eq!(plan.output, plan.render);
            assert!(!plan.is_scaled());
        }
    }

    #[test]
    fn wide_source_derives_width() {
        let src = SourceGeometry::landscape(384, 224, 4, 3);
        let plan = plan(&src, &target(320, 240)).unwrap();
        assert_eq!(plan.output, FrameSize::new(298, 224));
        assert!(plan.is_scaled());
    }

    #[test]
    fn tall_source_derives_height() {
        let src = SourceGeometry::landscape(320, 256, 4, 3);
        let plan = plan(&src, &target(400, 240)).unwrap();
        assert_eq!(plan.output, FrameSize::new(320, 240));
    }

    #[test]
    fn fitting_source_falls_back_to_render_size() {
        let src = SourceGeometry::landscape(320, 224, 4, 3);
        let plan = plan(&src, &target(1920, 1080)).unwrap();
        assert_eq!(plan.output, plan.render);
    }

    #[test]
    fn rotated_source_on_large_display_is_untouched() {
        let plan = plan(&portrait(224, 320), &target(1920, 1080)).unwrap();
        assert_eq!(plan.output, FrameSize::new(224, 320));
        assert!(!plan.is_scaled());
    }

    #[test]
    fn rotated_height_is_compared_against_landscape_width() {
        let plan = plan(&portrait(224, 320), &target(160, 120)).unwrap();
        // Exactly one axis keeps its source value.
        assert_eq!(plan.output.width, 224);
        assert_ne!(plan.output.height, 320);
        assert_eq!(plan.output.height, (224.0_f32 * (4.0 / 3.0)) as u32);
    }

    #[test]
    fn rotated_width_is_compared_against_landscape_height() {
        let plan = plan(&portrait(224, 320), &target(400, 200)).unwrap();
        assert_eq!(plan.output, FrameSize::new(240, 320));
    }

    #[test]
    fn layouts_transpose_when_rotated() {
        let plan = plan(&portrait(224, 320), &target(160, 120)).unwrap();
        assert_eq!(plan.render_layout(), FrameSize::new(320, 224));
        assert_eq!(plan.output_layout(), FrameSize::new(298, 224));
    }

    #[test]
    fn scale_without_dimensions_fails() {
        let src = SourceGeometry::landscape(384, 224, 4, 3);
        let scale = ScaleConfig {
            mode: ScaleMode::ShortestXAspect,
            ..ScaleConfig::default()
        };
        assert!(matches!(
            plan(&src, &scale),
            Err(StreamError::Config(ConfigError::ScaleWithoutDimensions))
        ));
    }

    #[test]
    fn zero_aspect_fails() {
        let src = SourceGeometry::landscape(384, 224, 0, 3);
        assert!(matches!(
            plan(&src, &target(320, 240)),
            Err(StreamError::Config(ConfigError::InvalidAspect { .. }))
        ));
    }

    #[test]
    fn empty_source_fails() {
        let src = SourceGeometry::landscape(0, 224, 4, 3);
        assert!(matches!(
            plan(&src, &ScaleConfig::none()),
            Err(StreamError::InvalidGeometry(_))
        ));
    }
}
