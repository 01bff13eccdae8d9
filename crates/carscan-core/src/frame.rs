//! CPU frame buffers for decoded video frames.
//!
//! Frames flow from the video source through sampling and analysis, and
//! derived copies (thumbnails, previews) are retained in the buffer cache.
//! Memory accounting must therefore be exact: `memory_size` is the single
//! source of truth for how much a buffer costs.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Pixel format of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel). The working format of the pipeline.
    #[default]
    Rgba8,
    /// 8-bit grayscale, used for derived single-channel buffers.
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Unpadded byte size of a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * self.bytes_per_pixel()
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FramePlane {
    /// Create a zeroed plane. Stride is aligned to 64 bytes for SIMD
    /// friendliness and cheap interop with decoder output.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
        }
    }

    /// Bytes per pixel as laid out in this plane.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        if self.width == 0 {
            return 1;
        }
        (self.stride / self.width as usize).max(1)
    }

    /// Get a row of pixel data (without stride padding).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel();
        &self.data[start..end]
    }

    /// Get a mutable row of pixel data (without stride padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let bpp = self.bytes_per_pixel();
        let start = y as usize * self.stride;
        let end = start + self.width as usize * bpp;
        &mut self.data[start..end]
    }
}

/// A decoded video frame in CPU memory.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data planes (packed formats use a single plane)
    pub planes: SmallVec<[FramePlane; 3]>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = smallvec::smallvec![FramePlane::new(
            width,
            height,
            format.bytes_per_pixel()
        )];
        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Create an RGBA8 frame filled with a single opaque color.
    ///
    /// Scripted video sources and tests use this to build frames whose
    /// visual-difference score against each other is exactly predictable.
    pub fn solid(width: u32, height: u32, r: u8, g: u8, b: u8) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        let plane = frame.primary_plane_mut();
        for y in 0..height {
            let row = plane.row_mut(y);
            for px in row.chunks_exact_mut(4) {
                px[0] = r;
                px[1] = g;
                px[2] = b;
                px[3] = 255;
            }
        }
        frame
    }

    /// Total memory used by this frame's pixel data in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// A buffer is valid when it has non-zero dimensions and allocated
    /// pixel data. Released or defaulted buffers fail this check and are
    /// treated everywhere as "no buffer available".
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && !self.planes.is_empty()
            && self.planes.iter().all(|p| !p.data.is_empty())
    }

    /// Get the primary plane (plane 0).
    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        &self.planes[0]
    }

    /// Get the primary plane mutably.
    #[inline]
    pub fn primary_plane_mut(&mut self) -> &mut FramePlane {
        &mut self.planes[0]
    }
}

/// Arc-wrapped frame buffer for shared ownership.
///
/// The buffer cache hands these out: an evicted buffer stays alive for any
/// reader still holding a clone, so eviction never races a concurrent read
/// into a dangling buffer.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
