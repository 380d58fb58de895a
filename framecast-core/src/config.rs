//! Streaming options consumed from the host's command line or config file.
//!
//! Parsing is lenient at the [`StreamSettings`] level: a malformed value is
//! logged and the option keeps its default, so a typo never stops the
//! emulator from starting.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::ConfigError;

// ── ScaleMode ────────────────────────────────────────────────────

/// How the output resolution is derived from the source resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    /// Stream at the native render resolution.
    #[default]
    None,
    /// Keep the shorter axis and derive the other from the aspect ratio,
    /// when the source overflows the landscape target.
    ShortestXAspect,
}

impl ScaleMode {
    /// Parse the option value (`none` | `shortestxaspect`).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim() {
            "none" => Ok(ScaleMode::None),
            "shortestxaspect" => Ok(ScaleMode::ShortestXAspect),
            other => Err(ConfigError::UnknownScaleMode(other.to_string())),
        }
    }
}

impl FromStr for ScaleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMode::None => f.write_str("none"),
            ScaleMode::ShortestXAspect => f.write_str("shortestxaspect"),
        }
    }
}

// ── Dimensions ───────────────────────────────────────────────────

/// Target device size in its natural landscape orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Parse a `WIDTHxHEIGHT` string such as `1920x1080`.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| ConfigError::MissingDelimiter(s.to_string()))?;

        let width = w.trim().parse::<u32>().unwrap_or(0);
        let height = h.trim().parse::<u32>().unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions(s.to_string()));
        }

        Ok(Self { width, height })
    }
}

impl FromStr for Dimensions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── ScaleConfig ──────────────────────────────────────────────────

/// Immutable per-session scaling configuration.
///
/// A landscape dimension of `0` means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaleConfig {
    pub mode: ScaleMode,
    pub landscape_width: u32,
    pub landscape_height: u32,
}

impl ScaleConfig {
    /// Config that never scales.
    pub fn none() -> Self {
        Self::default()
    }

    /// Scale towards the given landscape device.
    pub fn shortest_x_aspect(landscape: Dimensions) -> Self {
        Self {
            mode: ScaleMode::ShortestXAspect,
            landscape_width: landscape.width,
            landscape_height: landscape.height,
        }
    }

    /// A scale mode needs both landscape dimensions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode != ScaleMode::None && (self.landscape_width == 0 || self.landscape_height == 0)
        {
            return Err(ConfigError::ScaleWithoutDimensions);
        }
        Ok(())
    }
}

// ── StreamSettings ───────────────────────────────────────────────

/// Everything the streaming session needs from the host configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSettings {
    pub scale: ScaleConfig,
    /// Log the server frame rate once per second.
    pub show_fps: bool,
    /// Ask clients to flip the image vertically.
    pub flip_vertical: bool,
}

impl StreamSettings {
    /// Build settings from raw option strings.
    ///
    /// Each malformed option is reported with a warning and left at its
    /// default. Whether the resulting scale configuration is usable is
    /// checked later by [`ScaleConfig::validate`].
    pub fn from_options(
        output_dims: Option<&str>,
        scale: Option<&str>,
        show_fps: bool,
        flip_vertical: bool,
    ) -> Self {
        let mut settings = Self {
            show_fps,
            flip_vertical,
            ..Self::default()
        };

        if let Some(raw) = output_dims {
            match Dimensions::parse(raw) {
                Ok(dims) => {
                    info!("output device dimensions: {dims}");
                    settings.scale.landscape_width = dims.width;
                    settings.scale.landscape_height = dims.height;
                }
                Err(e) => warn!("{e}"),
            }
        }

        if let Some(raw) = scale {
            match ScaleMode::parse(raw) {
                Ok(mode) => {
                    info!("scaling mode: {mode}");
                    settings.scale.mode = mode;
                }
                Err(e) => warn!("{e}"),
            }
        }

        settings
    }
}

// ── Tests ────────────────────────────────────────────────────────
