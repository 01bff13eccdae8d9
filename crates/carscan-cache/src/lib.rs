//! CarScan Cache - memory-budgeted buffer registry
//!
//! Bounds the total memory retained by derived image buffers (thumbnails,
//! previews, kept originals) and evicts the least valuable buffers first
//! when the budget comes under pressure.

pub mod cache;

pub use cache::{BufferCache, CacheStats};

use carscan_core::memory_budget;
use serde::{Deserialize, Serialize};

/// What kind of derived buffer an entry holds.
///
/// Categories drive eviction priority: thumbnails are cheapest to
/// regenerate and go first, originals are protected longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferCategory {
    Thumbnail,
    Preview,
    Original,
}

impl BufferCategory {
    /// Eviction priority, lower evicts first. Table-driven so the policy
    /// is visible in one place.
    pub fn eviction_priority(self) -> u8 {
        match self {
            Self::Thumbnail => 0,
            Self::Preview => 1,
            Self::Original => 2,
        }
    }
}

/// Memory budget configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Soft ceiling for all tracked buffers.
    pub max_bytes: usize,
    /// Crossing this triggers a synchronous cleanup pass.
    pub cleanup_threshold_bytes: usize,
    /// Cleanup aims at this fraction of the threshold.
    pub retain_fraction: f64,
    /// Usage above this fraction of the ceiling counts as critical.
    pub critical_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: memory_budget::MAX_TRACKED_BYTES,
            cleanup_threshold_bytes: memory_budget::CLEANUP_THRESHOLD_BYTES,
            retain_fraction: memory_budget::RETAIN_FRACTION,
            critical_fraction: memory_budget::CRITICAL_FRACTION,
        }
    }
}
