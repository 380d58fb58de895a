//! Domain-specific error types for the streaming subsystem.
//!
//! All fallible operations return `Result<T, StreamError>`.
//! Nothing in this crate is allowed to take emulation down with it: every
//! error is typed, logged by the caller and at worst disables streaming.

use std::net::SocketAddr;

use thiserror::Error;

/// Coarse category of a [`StreamError`], used to decide how loudly to log
/// and which part of the session to tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad option; the option reverts to its default.
    Config,
    /// Buffer allocation failed; the session is aborted.
    Resource,
    /// Listener or relay failure; the transport is stopped.
    Transport,
    /// A single client misbehaved; only that client is dropped.
    Client,
    /// Bytes on the wire did not follow the framing rules.
    Protocol,
}

/// The canonical error type for the streaming subsystem.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Configuration Errors ─────────────────────────────────────
    /// An option failed to parse or validate.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The geometry cannot be streamed (zero-sized, overflowing, ...).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    // ── Resource Errors ──────────────────────────────────────────
    /// A frame buffer could not be allocated.
    #[error("failed to allocate {bytes} bytes for the {buffer} buffer")]
    Allocation { buffer: &'static str, bytes: usize },

    /// Only 16 bits per pixel are supported.
    #[error("unsupported pixel depth: {0} bytes per pixel")]
    UnsupportedDepth(usize),

    // ── Transport Errors ─────────────────────────────────────────
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Checking the listener for new connections failed.
    #[error("poll failed: {0}")]
    Poll(std::io::Error),

    /// The relay connection task is gone.
    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    /// The sink was used in a state that does not allow the operation.
    #[error("transport not listening")]
    NotListening,

    // ── Client Errors ────────────────────────────────────────────
    /// A write to a single client failed.
    #[error("client {peer} write failed: {reason}")]
    ClientWrite { peer: String, reason: String },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The handshake did not carry the framecast magic number.
    #[error("invalid magic: {0:#010x}")]
    InvalidMagic(u32),

    /// The handshake announced a pixel format we do not know.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(i32),

    /// The handshake fields contradict each other.
    #[error("invalid preamble: {0}")]
    InvalidPreamble(&'static str),

    /// A frame exceeds the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame payload did not match the size declared in the handshake.
    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    // ── I/O ──────────────────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            StreamError::Config(_) | StreamError::InvalidGeometry(_) => ErrorClass::Config,
            StreamError::Allocation { .. } | StreamError::UnsupportedDepth(_) => {
                ErrorClass::Resource
            }
            StreamError::Bind { .. }
            | StreamError::Poll(_)
            | StreamError::RelayUnavailable(_)
            | StreamError::NotListening
            | StreamError::Io(_) => ErrorClass::Transport,
            StreamError::ClientWrite { .. } => ErrorClass::Client,
            StreamError::InvalidMagic(_)
            | StreamError::UnsupportedPixelFormat(_)
            | StreamError::InvalidPreamble(_)
            | StreamError::FrameTooLarge { .. }
            | StreamError::InvalidFrameLength { .. } => ErrorClass::Protocol,
        }
    }
}

// ── ConfigError ──────────────────────────────────────────────────

/// Typed error for option parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The dimension string has no `x` between width and height.
    #[error("dimensions ignored; missing w/h delimiter in '{0}'")]
    MissingDelimiter(String),

    /// Width or height is not a positive integer.
    #[error("dimensions ignored; '{0}' not parsed as valid dimensions")]
    InvalidDimensions(String),

    /// The scale-mode name is not known.
    #[error("unrecognized scaling mode: {0}")]
    UnknownScaleMode(String),

    /// A scale mode was requested without target device dimensions.
    #[error("scaling mode supplied without device dimensions")]
    ScaleWithoutDimensions,

    /// The source aspect ratio has a zero term.
    #[error("invalid aspect ratio {x}:{y}")]
    InvalidAspect { x: u32, y: u32 },
}

// ── Tests ────────────────────────────────────────────────────────
