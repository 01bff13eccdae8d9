//! Result records assembled by the orchestrator.

use carscan_analyze::Detection;
use carscan_media::ExtractionReason;
use serde::{Deserialize, Serialize};

/// Analysis outcome for one sampled frame.
///
/// Produced exactly once per frame the sampler emitted, whether the
/// analyzer succeeded or not. Retained raster derivatives live in the
/// buffer cache and are referenced by key — the cache stays the sole owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAnalysisResult {
    /// Index of the frame within the run.
    pub frame_index: u32,
    /// Timestamp of the frame within the video.
    pub timestamp_ms: u64,
    /// Damage found in this frame; empty on analyzer failure.
    pub detections: Vec<Detection>,
    /// Wall-clock time spent on this frame, derivations included.
    pub processing_time_ms: u64,
    /// Why the sampler kept this frame.
    pub reason: ExtractionReason,
    /// Set when the analyzer failed for this frame.
    pub error_message: Option<String>,
    /// Cache key of the retained thumbnail, if one was kept.
    pub thumbnail_key: Option<String>,
    /// Cache key of the retained preview, if one was kept.
    pub preview_key: Option<String>,
}

impl FrameAnalysisResult {
    /// Whether this frame's analysis failed.
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Terminal artifact of one processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalysisResult {
    /// Identifier of the analyzed video.
    pub video_id: String,
    /// Per-frame results, sorted by frame index.
    pub frames: Vec<FrameAnalysisResult>,
    /// Sum of detections across all frames.
    pub total_detections: usize,
    /// Video duration reported by the source.
    pub duration_ms: u64,
    /// Sum of per-frame processing times.
    pub total_processing_ms: u64,
    /// Set when the run ended early (cancellation/timeout).
    pub error_message: Option<String>,
}

impl VideoAnalysisResult {
    /// Frames whose analysis failed.
    pub fn error_frames(&self) -> impl Iterator<Item = &FrameAnalysisResult> {
        self.frames.iter().filter(|f| f.is_error())
    }

    /// The highest severity seen across all detections, if any.
    pub fn peak_severity(&self) -> Option<carscan_analyze::Severity> {
        self.frames
            .iter()
            .flat_map(|f| f.detections.iter())
            .map(|d| d.severity)
            .max()
    }
}
