//! Configuration for the streaming server.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::{DEFAULT_CAPACITY, DEFAULT_PORT, SourceGeometry, StreamSettings, TransportConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and backend selection.
    pub network: NetworkConfig,
    /// Target device and scaling.
    pub output: OutputConfig,
    /// Geometry of the stand-in core.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Which [`FrameSink`](framecast_core::FrameSink) carries the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Serve viewers directly.
    #[default]
    Direct,
    /// Push the stream to an upstream relay.
    Relay,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface the direct backend listens on.
    pub listen_addr: String,
    /// TCP port viewers connect to.
    pub port: u16,
    /// Concurrent viewers; further connections are closed.
    pub max_clients: usize,
    pub backend: Backend,
    /// Relay `host:port` for the relay backend.
    pub relay_addr: String,
}

/// Output configuration, in the same syntax as the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Landscape device dimensions, `WIDTHxHEIGHT`. Empty means unset.
    pub dims: String,
    /// Scale mode: "none" or "shortestxaspect".
    pub scale: String,
    /// Ask viewers to flip the picture vertically.
    pub flip_vertical: bool,
}

/// Stand-in core geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    pub aspect_x: u32,
    pub aspect_y: u32,
    /// Portrait cabinet.
    pub rotated: bool,
    /// Screen drawn upside down.
    pub flipped: bool,
    /// Frames produced per second.
    pub fps: u32,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Log the server frame rate once per second.
    pub show_fps: bool,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            output: OutputConfig::default(),
            source: SourceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_CAPACITY,
            backend: Backend::Direct,
            relay_addr: "127.0.0.1:3501".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dims: String::new(),
            scale: "none".into(),
            flip_vertical: false,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            aspect_x: 4,
            aspect_y: 3,
            rotated: false,
            flipped: false,
            fps: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            show_fps: false,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Session settings; malformed option strings fall back with a warning.
    pub fn stream_settings(&self) -> StreamSettings {
        let dims = Some(self.output.dims.trim()).filter(|s| !s.is_empty());
        let scale = Some(self.output.scale.trim()).filter(|s| !s.is_empty());
        StreamSettings::from_options(
            dims,
            scale,
            self.logging.show_fps,
            self.output.flip_vertical,
        )
    }

    pub fn source_geometry(&self) -> SourceGeometry {
        let s = &self.source;
        SourceGeometry {
            width: s.width,
            height: s.height,
            aspect_x: s.aspect_x,
            aspect_y: s.aspect_y,
            rotated: s.rotated,
            flipped: s.flipped,
        }
    }

    /// Listener settings for the direct backend.
    pub fn transport_config(&self) -> Result<TransportConfig, AddrParseError> {
        let ip: IpAddr = self.network.listen_addr.trim().parse()?;
        Ok(TransportConfig {
            listen_addr: SocketAddr::new(ip, self.network.port),
            max_clients: self.network.max_clients.max(1),
        })
    }

    pub fn relay_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.network.relay_addr.trim().parse()
    }

    /// Time between produced frames (1..=240 fps).
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.source.fps.clamp(1, 240)))
    }
}

// ── Tests ────────────────────────────────────────────────────────
