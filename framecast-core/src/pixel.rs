//! RGB565 packing helpers.
//!
//! Channels are expanded to 8 bits on unpack (`c * 255 / max`) and
//! truncated on pack, so `pack(unpack(c)) == c` for every 16-bit value.

/// Bytes per pixel of the only supported format.
pub const BYTES_PER_PIXEL: usize = 2;

/// Bits per pixel reported to the emulation core.
pub const BITS_PER_PIXEL: u32 = 16;

/// Red channel expanded to 0..=255.
#[inline]
pub const fn red(c: u16) -> u32 {
    ((c as u32 >> 11) & 0x1f) * 255 / 31
}

/// Green channel expanded to 0..=255.
#[inline]
pub const fn green(c: u16) -> u32 {
    ((c as u32 >> 5) & 0x3f) * 255 / 63
}

/// Blue channel expanded to 0..=255.
#[inline]
pub const fn blue(c: u16) -> u32 {
    (c as u32 & 0x1f) * 255 / 31
}

/// Pack 8-bit channels into RGB565.
#[inline]
pub const fn pack(r: u32, g: u32, b: u32) -> u16 {
    ((((r & 0xff) >> 3) << 11) | (((g & 0xff) >> 2) << 5) | ((b & 0xff) >> 3)) as u16
}

// ── Tests ────────────────────────────────────────────────────────
