//! Box-filter downsampling of RGB565 frames.
//!
//! Each destination pixel is the channel-wise mean of the source block that
//! maps onto it. Block edges are `floor(i * src / (dst + 1))`, which keeps
//! every block inside the source at the cost of slightly uneven blocks at the
//! first and last row/column. Blocks are clamped to at least one source
//! pixel, so no geometry can produce an empty average.
//!
//! Layouts are passed row-major as laid out in memory; a rotated plan has
//! already exchanged width and height for both buffers.

use tracing::debug;

use crate::buffer::FrameBuffers;
use crate::error::StreamError;
use crate::geometry::FrameSize;
use crate::pixel;

/// Scale `src` (`src_size`) into `dst` (`dst_size`).
///
/// Identical sizes are a no-op: the caller aliases those buffers instead.
pub fn box_filter(
    src: &[u16],
    src_size: FrameSize,
    dst: &mut [u16],
    dst_size: FrameSize,
) -> Result<(), StreamError> {
    if src_size == dst_size {
        debug!("attempt to process identically-sized buffers");
        return Ok(());
    }
    if src_size.is_empty() || dst_size.is_empty() {
        return Err(StreamError::InvalidGeometry(format!(
            "cannot scale {src_size} to {dst_size}"
        )));
    }
    check_len(src.len(), src_size)?;
    check_len(dst.len(), dst_size)?;

    let src_w = src_size.width as usize;
    let cols = spans(src_size.width, dst_size.width);
    let rows = spans(src_size.height, dst_size.height);

    for (dst_row, &(y1, y2)) in dst.chunks_exact_mut(dst_size.width as usize).zip(&rows) {
        for (out, &(x1, x2)) in dst_row.iter_mut().zip(&cols) {
            let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
            for src_row in src[y1 * src_w..y2 * src_w].chunks_exact(src_w) {
                for &c in &src_row[x1..x2] {
                    r += pixel::red(c) as u64;
                    g += pixel::green(c) as u64;
                    b += pixel::blue(c) as u64;
                }
            }

            let count = ((x2 - x1) * (y2 - y1)) as u64;
            *out = pixel::pack((r / count) as u32, (g / count) as u32, (b / count) as u32);
        }
    }

    Ok(())
}

/// Downsample the render buffer into the output buffer, if they differ.
///
/// Returns whether a scaling pass ran.
pub fn downsample(buffers: &mut FrameBuffers) -> Result<bool, StreamError> {
    let src_size = buffers.render_layout();
    let dst_size = buffers.output_layout();
    match buffers.scaling_pair() {
        Some((src, dst)) => {
            box_filter(src, src_size, dst, dst_size)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Source `[start, end)` span for every destination index along one axis.
fn spans(src: u32, dst: u32) -> Vec<(usize, usize)> {
    let ratio = src as f32 / (dst as f32 + 1.0);
    let src = src as usize;
    (0..dst)
        .map(|i| {
            let start = ((i as f32 * ratio) as usize).min(src - 1);
            let end = (((i + 1) as f32 * ratio) as usize).clamp(start + 1, src);
            (start, end)
        })
        .collect()
}

fn check_len(len: usize, size: FrameSize) -> Result<(), StreamError> {
    if len < size.pixel_count() {
        return Err(StreamError::InvalidFrameLength {
            expected: size.pixel_count(),
            actual: len,
        });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
