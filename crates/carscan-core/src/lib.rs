//! CarScan Core - Foundation types for the damage analysis engine
//!
//! This crate provides the fundamental types used throughout CarScan:
//! - Frame buffers and pixel formats
//! - Image buffer utilities (resize, thumbnail, footprint)
//! - Geometric primitives for detection boxes
//! - The shared error type

pub mod error;
pub mod frame;
pub mod geometry;
pub mod image_ops;

pub use error::{Result, ScanError};
pub use frame::{FrameBuffer, FramePlane, PixelFormat, SharedFrameBuffer};
pub use geometry::Rect;

/// Memory budget defaults for retained image buffers.
pub mod memory_budget {
    /// Soft ceiling for all tracked derived buffers.
    pub const MAX_TRACKED_BYTES: usize = 100 * 1024 * 1024; // 100 MB

    /// Crossing this triggers a synchronous cleanup pass.
    pub const CLEANUP_THRESHOLD_BYTES: usize = 80 * 1024 * 1024; // 80 MB

    /// Cleanup aims to bring usage down to this fraction of the threshold.
    pub const RETAIN_FRACTION: f64 = 0.7;

    /// Usage above this fraction of the ceiling counts as critical.
    pub const CRITICAL_FRACTION: f64 = 0.9;
}
