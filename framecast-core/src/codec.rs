//! `tokio_util` codec for the framecast stream.
//!
//! The stream is stateful: one [`FrameGeometry`] handshake, then frames of
//! exactly `total_bytes` each with no delimiter. The codec remembers the
//! handshake in each direction and sizes frames from it.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::StreamError;
use crate::preamble::FrameGeometry;

/// Largest frame payload the codec accepts (64 MiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// One unit of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Preamble(FrameGeometry),
    Frame(Bytes),
}

/// Codec for [`StreamMessage`]s.
#[derive(Debug, Default)]
pub struct StreamCodec {
    sent: Option<FrameGeometry>,
    received: Option<FrameGeometry>,
}

impl StreamCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handshake decoded from the peer, if any yet.
    pub fn received_geometry(&self) -> Option<&FrameGeometry> {
        self.received.as_ref()
    }
}

fn check_frame_size(geometry: &FrameGeometry) -> Result<(), StreamError> {
    let size = geometry.frame_len();
    if size > MAX_FRAME_SIZE {
        return Err(StreamError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

impl Decoder for StreamCodec {
    type Item = StreamMessage;
    type Error = StreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(geometry) = self.received else {
            if src.len() < FrameGeometry::SIZE {
                return Ok(None);
            }
            let geometry = FrameGeometry::decode(&src[..FrameGeometry::SIZE])?;
            check_frame_size(&geometry)?;
            src.advance(FrameGeometry::SIZE);
            self.received = Some(geometry);
            return Ok(Some(StreamMessage::Preamble(geometry)));
        };

        let len = geometry.frame_len();
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        Ok(Some(StreamMessage::Frame(src.split_to(len).freeze())))
    }
}

impl Encoder<StreamMessage> for StreamCodec {
    type Error = StreamError;

    fn encode(&mut self, item: StreamMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StreamMessage::Preamble(geometry) => {
                if self.sent.is_some() {
                    return Err(StreamError::InvalidPreamble("handshake already sent"));
                }
                geometry.validate()?;
                check_frame_size(&geometry)?;
                dst.extend_from_slice(&geometry.encode());
                self.sent = Some(geometry);
            }
            StreamMessage::Frame(frame) => {
                let geometry = self
                    .sent
                    .ok_or(StreamError::InvalidPreamble("frame before handshake"))?;
                if frame.len() != geometry.frame_len() {
                    return Err(StreamError::InvalidFrameLength {
                        expected: geometry.frame_len(),
                        actual: frame.len(),
                    });
                }
                dst.extend_from_slice(&frame);
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FrameSize, GeometryPlan};

    fn geometry(w: u32, h: u32) -> FrameGeometry {
        let size = FrameSize::new(w, h);
        FrameGeometry::from_plan(
            &GeometryPlan {
                render: size,
                output: size,
                rotated: false,
                flipped: false,
            },
            false,
        )
        .unwrap()
    }

    #[test]
    fn decodes_preamble_then_fixed_frames() {
        let g = geometry(2, 2);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&g.encode());
        buf.extend_from_slice(&[1u8; 8]);
        buf.extend_from_slice(&[2u8; 5]);

        let mut codec = StreamCodec::new();
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamMessage::Preamble(g))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamMessage::Frame(Bytes::from_static(&[1u8; 8])))
        );
        // Only 5 of 8 bytes of the next frame have arrived.
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&[2u8; 3]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamMessage::Frame(Bytes::from_static(&[2u8; 8])))
        );
    }

    #[test]
    fn waits_for_a_whole_preamble() {
        let g = geometry(2, 2);
        let mut buf = BytesMut::from(&g.encode()[..20]);
        let mut codec = StreamCodec::new();
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(codec.received_geometry().is_none());
    }

    #[test]
    fn rejects_foreign_stream() {
        let mut buf = BytesMut::from(&[0u8; FrameGeometry::SIZE][..]);
        let mut codec = StreamCodec::new();
        assert!(matches!(
            codec.decode(&mut buf),
            Err(StreamError::InvalidMagic(0))
        ));
    }

    #[test]
    fn encoder_enforces_ordering_and_size() {
        let g = geometry(2, 1);
        let mut codec = StreamCodec::new();
        let mut dst = BytesMut::new();

        let early = codec.encode(StreamMessage::Frame(Bytes::from_static(&[0; 4])), &mut dst);
        assert!(matches!(early, Err(StreamError::InvalidPreamble(_))));

        codec.encode(StreamMessage::Preamble(g), &mut dst).unwrap();
        assert!(
            codec
                .encode(StreamMessage::Preamble(g), &mut dst)
                .is_err()
        );

        let short = codec.encode(StreamMessage::Frame(Bytes::from_static(&[0; 3])), &mut dst);
        assert!(matches!(
            short,
            Err(StreamError::InvalidFrameLength {
                expected: 4,
                actual: 3
            })
        ));

        codec
            .encode(StreamMessage::Frame(Bytes::from_static(&[7; 4])), &mut dst)
            .unwrap();
        assert_eq!(dst.len(), FrameGeometry::SIZE + 4);
        assert_eq!(&dst[FrameGeometry::SIZE..], &[7; 4]);
    }
}
