//! # framecast-core
//!
//! Frame-streaming library for an arcade emulator: each rendered frame is
//! delivered, over a small binary protocol, to the viewers connected at the
//! time.
//!
//! This crate contains:
//! - **Geometry**: `plan()` resolves the render/output sizes for a source and a `ScaleConfig`
//! - **Buffers**: `FrameBuffers` owns the render buffer and the optional output buffer
//! - **Downsampler**: RGB565 box filter from render to output buffer
//! - **Wire format**: the 28-byte `FrameGeometry` handshake and `StreamCodec`
//! - **Transport**: the `FrameSink` capability with `TransportServer` and `RelaySink`
//! - **Pump & session**: `FramePump` and `StreamingSession` drive all of the above per frame
//! - **Viewer**: `StreamViewer`, the client side of the protocol
//! - **Error**: `StreamError` / `ConfigError`, typed with `thiserror`

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod downsample;
pub mod error;
pub mod fps;
pub mod geometry;
pub mod pixel;
pub mod preamble;
pub mod pump;
pub mod registry;
pub mod session;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::{FrameBuffers, OutputTarget, RenderTarget};
pub use client::StreamViewer;
pub use codec::{MAX_FRAME_SIZE, StreamCodec, StreamMessage};
pub use config::{Dimensions, ScaleConfig, ScaleMode, StreamSettings};
pub use error::{ConfigError, ErrorClass, StreamError};
pub use fps::{Clock, FpsMeter, MonotonicClock};
pub use geometry::{FrameSize, GeometryPlan, SourceGeometry, plan};
pub use preamble::{AttributeFlags, FrameGeometry, MAGIC, PixelFormat};
pub use pump::{FramePump, PumpReport};
pub use registry::{ClientRegistry, DEFAULT_CAPACITY};
pub use session::StreamingSession;
pub use transport::{
    BroadcastReport, DEFAULT_PORT, FrameSink, RelaySink, SinkState, TransportConfig,
    TransportServer,
};
