//! The frame analyzer contract.
//!
//! Detection numerics (box decoding, non-max suppression, model execution)
//! live outside this workspace; the pipeline consumes any implementation of
//! [`FrameAnalyzer`]. The scripted analyzer below produces deterministic
//! detections for tests and demos.

use crate::detection::Detection;
use crate::error::{AnalyzeError, AnalyzeResult};
use carscan_core::FrameBuffer;
use std::collections::HashMap;
use uuid::Uuid;

/// Identity of the frame being analyzed, passed through to the detector.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeContext {
    /// Processing run this frame belongs to.
    pub run_id: Uuid,
    /// Index of the frame within the run.
    pub frame_index: u32,
    /// Timestamp of the frame within the video.
    pub timestamp_ms: u64,
}

/// A damage detector.
///
/// Implementations must be safe to call concurrently for different frames;
/// the pipeline keeps several analyses in flight while decoding continues.
/// Failures are per-frame recoverable — the pipeline records them and moves
/// on.
pub trait FrameAnalyzer: Send + Sync {
    /// Analyze one frame and return the detections found in it.
    fn analyze(&self, frame: &FrameBuffer, ctx: &AnalyzeContext) -> AnalyzeResult<Vec<Detection>>;
}

/// Deterministic analyzer for tests and demos.
///
/// Returns scripted detections keyed by frame index and can be told to fail
/// for specific frames.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    detections: HashMap<u32, Vec<Detection>>,
    failures: HashMap<u32, String>,
}

impl ScriptedAnalyzer {
    /// An analyzer that finds nothing anywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these detections for the given frame index.
    pub fn with_detections(mut self, frame_index: u32, detections: Vec<Detection>) -> Self {
        self.detections.insert(frame_index, detections);
        self
    }

    /// Fail with an inference error for the given frame index.
    pub fn with_failure(mut self, frame_index: u32, message: impl Into<String>) -> Self {
        self.failures.insert(frame_index, message.into());
        self
    }
}

impl FrameAnalyzer for ScriptedAnalyzer {
    fn analyze(&self, frame: &FrameBuffer, ctx: &AnalyzeContext) -> AnalyzeResult<Vec<Detection>> {
        if !frame.is_valid() {
            return Err(AnalyzeError::InvalidFrame(format!(
                "frame {} has no pixel data",
                ctx.frame_index
            )));
        }
        if let Some(message) = self.failures.get(&ctx.frame_index) {
            return Err(AnalyzeError::Inference(message.clone()));
        }
        Ok(self
            .detections
            .get(&ctx.frame_index)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DamageType, Severity};
    use carscan_core::Rect;

    fn dent() -> Detection {
        Detection {
            damage_type: DamageType::Dent,
            confidence: 0.9,
            bbox: Rect::new(0.0, 0.0, 32.0, 32.0),
            severity: Severity::Moderate,
        }
    }

    fn ctx(frame_index: u32) -> AnalyzeContext {
        AnalyzeContext {
            run_id: Uuid::new_v4(),
            frame_index,
            timestamp_ms: frame_index as u64 * 1000,
        }
    }

    #[test]
    fn scripted_detections_match_frame_index() {
        let analyzer = ScriptedAnalyzer::new().with_detections(1, vec![dent()]);
        let frame = FrameBuffer::solid(64, 64, 0, 0, 0);

        assert!(analyzer.analyze(&frame, &ctx(0)).unwrap().is_empty());
        assert_eq!(analyzer.analyze(&frame, &ctx(1)).unwrap().len(), 1);
    }

    #[test]
    fn scripted_failure_is_an_inference_error() {
        let analyzer = ScriptedAnalyzer::new().with_failure(2, "model timeout");
        let frame = FrameBuffer::solid(64, 64, 0, 0, 0);
        assert!(matches!(
            analyzer.analyze(&frame, &ctx(2)),
            Err(AnalyzeError::Inference(_))
        ));
    }
}
