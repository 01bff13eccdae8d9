//! Image buffer utilities: resized copies, thumbnails, memory footprint.
//!
//! These produce the derived buffers the cache tracks. Resampling is plain
//! bilinear over RGBA8 rows — quality is ample for thumbnails and previews,
//! and the code stays dependency-free.

use crate::error::{Result, ScanError};
use crate::frame::{FrameBuffer, PixelFormat};

/// Default longest-edge size for thumbnails.
pub const THUMBNAIL_MAX_DIM: u32 = 160;

/// Default longest-edge size for previews.
pub const PREVIEW_MAX_DIM: u32 = 640;

/// Create a resized RGBA8 copy of `frame` with the exact given dimensions.
pub fn resize(frame: &FrameBuffer, new_width: u32, new_height: u32) -> Result<FrameBuffer> {
    if !frame.is_valid() {
        return Err(ScanError::InvalidParameter(
            "cannot resize an invalid frame buffer".into(),
        ));
    }
    if frame.format != PixelFormat::Rgba8 {
        return Err(ScanError::InvalidParameter(format!(
            "resize expects Rgba8 input, got {:?}",
            frame.format
        )));
    }
    if new_width == 0 || new_height == 0 {
        return Err(ScanError::InvalidParameter(format!(
            "resize target must be non-zero, got {new_width}x{new_height}"
        )));
    }

    let mut out = FrameBuffer::new(new_width, new_height, PixelFormat::Rgba8);
    let src_plane = frame.primary_plane();
    let x_scale = frame.width as f32 / new_width as f32;
    let y_scale = frame.height as f32 / new_height as f32;

    for oy in 0..new_height {
        // Source coordinate of this output row, clamped to the last
        // interpolatable row pair.
        let sy = (oy as f32 + 0.5) * y_scale - 0.5;
        let sy = sy.clamp(0.0, frame.height as f32 - 1.0);
        let y0 = sy.floor() as u32;
        let y1 = (y0 + 1).min(frame.height - 1);
        let fy = sy - y0 as f32;

        let row0 = src_plane.row(y0);
        let row1 = src_plane.row(y1);

        let dst_row = out.planes[0].row_mut(oy);
        for ox in 0..new_width {
            let sx = (ox as f32 + 0.5) * x_scale - 0.5;
            let sx = sx.clamp(0.0, frame.width as f32 - 1.0);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(frame.width as usize - 1);
            let fx = sx - x0 as f32;

            let base = ox as usize * 4;
            for c in 0..4 {
                let tl = row0[x0 * 4 + c] as f32;
                let tr = row0[x1 * 4 + c] as f32;
                let bl = row1[x0 * 4 + c] as f32;
                let br = row1[x1 * 4 + c] as f32;
                let top = tl + (tr - tl) * fx;
                let bottom = bl + (br - bl) * fx;
                dst_row[base + c] = (top + (bottom - top) * fy).round() as u8;
            }
        }
    }

    Ok(out)
}

/// Create an aspect-preserving copy whose longest edge is at most `max_dim`.
///
/// A frame already within bounds is still copied so the result is an
/// independently owned buffer.
pub fn scale_to_fit(frame: &FrameBuffer, max_dim: u32) -> Result<FrameBuffer> {
    if max_dim == 0 {
        return Err(ScanError::InvalidParameter(
            "scale_to_fit max_dim must be non-zero".into(),
        ));
    }
    let longest = frame.width.max(frame.height);
    if longest <= max_dim {
        return resize(frame, frame.width, frame.height);
    }
    let scale = max_dim as f32 / longest as f32;
    let w = ((frame.width as f32 * scale).round() as u32).max(1);
    let h = ((frame.height as f32 * scale).round() as u32).max(1);
    resize(frame, w, h)
}

/// Thumbnail copy (longest edge [`THUMBNAIL_MAX_DIM`]).
pub fn thumbnail(frame: &FrameBuffer) -> Result<FrameBuffer> {
    scale_to_fit(frame, THUMBNAIL_MAX_DIM)
}

/// Preview copy (longest edge [`PREVIEW_MAX_DIM`]).
pub fn preview(frame: &FrameBuffer) -> Result<FrameBuffer> {
    scale_to_fit(frame, PREVIEW_MAX_DIM)
}

/// Memory footprint of a frame's pixel data in bytes.
pub fn memory_footprint(frame: &FrameBuffer) -> usize {
    frame.memory_size()
}
