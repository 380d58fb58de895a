//! # framecast-server: arcade frame streaming server
//!
//! Hosts a [`StreamingSession`](framecast_core::StreamingSession) around a
//! stand-in core that draws a test pattern, paced at the configured frame
//! rate. Viewers connect on TCP port 3500 (or the stream is pushed to a
//! relay) and receive the handshake followed by raw RGB565 frames.

pub mod config;
pub mod pattern;
pub mod service;
