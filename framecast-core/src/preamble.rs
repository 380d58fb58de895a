//! The per-connection handshake record.
//!
//! ## Wire format
//!
//! Sent once, immediately after accept (28 bytes, little-endian):
//! ```text
//! total_bytes:     i32  (4)   size of every following frame payload
//! stride_bytes:    i32  (4)   bytes per row
//! width:           i32  (4)   pixels per row
//! height:          i32  (4)   rows
//! pixel_format:    i32  (4)   1 = RGB565
//! attribute_flags: i32  (4)   bit 0 ROTATE_180, bit 1 VERTICAL_FLIP
//! magic:           i32  (4)   "FCST"
//! ```
//! Frames follow back to back with no length prefix.

use bitflags::bitflags;

use crate::error::StreamError;
use crate::geometry::GeometryPlan;
use crate::pixel::BYTES_PER_PIXEL;

/// Protocol identifier carried in every handshake.
pub const MAGIC: u32 = u32::from_le_bytes(*b"FCST");

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of the frame payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PixelFormat {
    /// 16-bit packed, 5 bits red, 6 bits green, 5 bits blue.
    Rgb565 = 1,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => BYTES_PER_PIXEL,
        }
    }
}

impl TryFrom<i32> for PixelFormat {
    type Error = StreamError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PixelFormat::Rgb565),
            other => Err(StreamError::UnsupportedPixelFormat(other)),
        }
    }
}

// ── AttributeFlags ───────────────────────────────────────────────

bitflags! {
    /// Orientation corrections the client must apply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeFlags: i32 {
        const ROTATE_180 = 0x1;
        const VERTICAL_FLIP = 0x2;
    }
}

// ── FrameGeometry ────────────────────────────────────────────────

/// Geometry of the stream as the client must interpret it.
///
/// Invariant: `total_bytes == stride_bytes * height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub total_bytes: i32,
    pub stride_bytes: i32,
    pub width: i32,
    pub height: i32,
    pub pixel_format: PixelFormat,
    pub attribute_flags: AttributeFlags,
    pub magic: u32,
}

impl FrameGeometry {
    /// Encoded size on the wire.
    pub const SIZE: usize = 28;

    /// Describe the output buffer of `plan`.
    ///
    /// A rotated cabinet that is not also flipped needs a half turn on the
    /// client.
    pub fn from_plan(plan: &GeometryPlan, flip_vertical: bool) -> Result<Self, StreamError> {
        let layout = plan.output_layout();
        let format = PixelFormat::Rgb565;

        let stride = layout.width as usize * format.bytes_per_pixel();
        let total = stride
            .checked_mul(layout.height as usize)
            .filter(|&t| t <= i32::MAX as usize)
            .ok_or_else(|| {
                StreamError::InvalidGeometry(format!("output {layout} overflows the handshake"))
            })?;

        let mut flags = AttributeFlags::empty();
        if plan.rotated && !plan.flipped {
            flags |= AttributeFlags::ROTATE_180;
        }
        if flip_vertical {
            flags |= AttributeFlags::VERTICAL_FLIP;
        }

        Ok(Self {
            total_bytes: total as i32,
            stride_bytes: stride as i32,
            width: layout.width as i32,
            height: layout.height as i32,
            pixel_format: format,
            attribute_flags: flags,
            magic: MAGIC,
        })
    }

    /// Size of each frame payload in bytes.
    pub fn frame_len(&self) -> usize {
        self.total_bytes as usize
    }

    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.total_bytes.to_le_bytes());
        buf[4..8].copy_from_slice(&self.stride_bytes.to_le_bytes());
        buf[8..12].copy_from_slice(&self.width.to_le_bytes());
        buf[12..16].copy_from_slice(&self.height.to_le_bytes());
        buf[16..20].copy_from_slice(&(self.pixel_format as i32).to_le_bytes());
        buf[20..24].copy_from_slice(&self.attribute_flags.bits().to_le_bytes());
        buf[24..28].copy_from_slice(&self.magic.to_le_bytes());
        buf
    }

    /// Deserialize and validate a handshake.
    pub fn decode(data: &[u8]) -> Result<Self, StreamError> {
        let field = |i: usize| -> Result<[u8; 4], StreamError> {
            data.get(i * 4..i * 4 + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or(StreamError::InvalidPreamble("truncated"))
        };

        let magic = u32::from_le_bytes(field(6)?);
        if magic != MAGIC {
            return Err(StreamError::InvalidMagic(magic));
        }

        let geometry = Self {
            total_bytes: i32::from_le_bytes(field(0)?),
            stride_bytes: i32::from_le_bytes(field(1)?),
            width: i32::from_le_bytes(field(2)?),
            height: i32::from_le_bytes(field(3)?),
            pixel_format: PixelFormat::try_from(i32::from_le_bytes(field(4)?))?,
            attribute_flags: AttributeFlags::from_bits_retain(i32::from_le_bytes(field(5)?)),
            magic,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check the size invariants.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(StreamError::InvalidPreamble("non-positive dimensions"));
        }
        let min_stride = self.width as i64 * self.pixel_format.bytes_per_pixel() as i64;
        if (self.stride_bytes as i64) < min_stride {
            return Err(StreamError::InvalidPreamble("stride shorter than a row"));
        }
        if self.total_bytes as i64 != self.stride_bytes as i64 * self.height as i64 {
            return Err(StreamError::InvalidPreamble(
                "total bytes differ from stride * height",
            ));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
