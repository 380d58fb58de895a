//! Viewer side of the stream.
//!
//! Connects to a direct-socket server, reads the handshake and then yields
//! one fixed-size frame payload at a time. Used by the probe binary and by
//! end-to-end tests.

use std::net::SocketAddr;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::codec::{StreamCodec, StreamMessage};
use crate::error::StreamError;
use crate::preamble::FrameGeometry;

/// A connected viewer that has received its handshake.
#[derive(Debug)]
pub struct StreamViewer {
    peer: SocketAddr,
    reader: FramedRead<TcpStream, StreamCodec>,
    geometry: FrameGeometry,
}

impl StreamViewer {
    /// Connect to `addr` and wait for the handshake.
    pub async fn connect(addr: SocketAddr) -> Result<Self, StreamError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream).await
    }

    /// Wait for the handshake on an already connected stream.
    pub async fn from_stream(stream: TcpStream) -> Result<Self, StreamError> {
        let peer = stream.peer_addr()?;
        let mut reader = FramedRead::new(stream, StreamCodec::new());

        let geometry = match reader.next().await {
            Some(Ok(StreamMessage::Preamble(geometry))) => geometry,
            Some(Ok(StreamMessage::Frame(_))) => {
                return Err(StreamError::InvalidPreamble("frame before handshake"));
            }
            Some(Err(e)) => return Err(e),
            None => return Err(StreamError::InvalidPreamble("closed before handshake")),
        };

        debug!(
            %peer,
            width = geometry.width,
            height = geometry.height,
            "received handshake"
        );
        Ok(Self {
            peer,
            reader,
            geometry,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Handshake announced by the server.
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Next frame payload, or `None` once the server closes the stream.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, StreamError> {
        match self.reader.next().await {
            Some(Ok(StreamMessage::Frame(frame))) => Ok(Some(frame)),
            Some(Ok(StreamMessage::Preamble(_))) => {
                Err(StreamError::InvalidPreamble("handshake sent twice"))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
