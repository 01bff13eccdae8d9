//! Video source contract.
//!
//! Container parsing and seek/decode mechanics live outside this workspace;
//! the pipeline consumes any implementation of [`VideoSource`]. The scripted
//! source below is the deterministic implementation used by tests and demos.

use carscan_core::{FrameBuffer, Result, ScanError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Metadata for an opened video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Total duration in milliseconds.
    pub duration_ms: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub frame_rate: f64,
}

/// A decodable video source.
///
/// Implementations must be callable from a blocking worker thread and safe
/// to share behind an `Arc` for the lifetime of one processing run.
pub trait VideoSource: Send + Sync {
    /// Opaque identifier (path, URI, asset id) used in results and logs.
    fn id(&self) -> &str;

    /// Read container metadata.
    ///
    /// Fails with [`ScanError::MetadataUnavailable`] for unreadable or
    /// corrupt input; this is fatal to a processing run.
    fn metadata(&self) -> Result<VideoMetadata>;

    /// Decode the frame nearest to `timestamp_ms`.
    ///
    /// A failure here is per-frame recoverable: the sampler logs it and
    /// moves on to the next timestamp.
    fn decode_frame_near(&self, timestamp_ms: u64) -> Result<FrameBuffer>;
}

/// One scripted scene: from `start_ms` onward frames take this appearance.
#[derive(Debug, Clone)]
struct Scene {
    start_ms: u64,
    color: [u8; 3],
    /// Resolution override, for mid-video dimension changes.
    size: Option<(u32, u32)>,
}

/// Deterministic in-memory video source.
///
/// Produces solid-color frames from a scene script so visual-difference
/// scores are exactly predictable. Supports metadata and per-timestamp
/// decode failure injection.
pub struct ScriptedVideoSource {
    id: String,
    duration_ms: u64,
    width: u32,
    height: u32,
    frame_rate: f64,
    scenes: Vec<Scene>,
    fail_metadata: bool,
    fail_decode_at: Vec<u64>,
    decoded: Mutex<Vec<u64>>,
}

impl ScriptedVideoSource {
    /// Create a source with a single scene of mid-gray frames.
    pub fn new(id: impl Into<String>, duration_ms: u64, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            duration_ms,
            width,
            height,
            frame_rate: 30.0,
            scenes: vec![Scene {
                start_ms: 0,
                color: [128, 128, 128],
                size: None,
            }],
            fail_metadata: false,
            fail_decode_at: Vec::new(),
            decoded: Mutex::new(Vec::new()),
        }
    }

    /// From `at_ms` onward, frames switch to the given color.
    pub fn with_scene_change_at(mut self, at_ms: u64, color: [u8; 3]) -> Self {
        self.scenes.push(Scene {
            start_ms: at_ms,
            color,
            size: None,
        });
        self.scenes.sort_by_key(|s| s.start_ms);
        self
    }

    /// From `at_ms` onward, frames decode at a different resolution.
    pub fn with_resolution_change_at(mut self, at_ms: u64, width: u32, height: u32) -> Self {
        let color = self
            .scenes
            .iter()
            .rev()
            .find(|s| s.start_ms <= at_ms)
            .map(|s| s.color)
            .unwrap_or([128, 128, 128]);
        self.scenes.push(Scene {
            start_ms: at_ms,
            color,
            size: Some((width, height)),
        });
        self.scenes.sort_by_key(|s| s.start_ms);
        self
    }

    /// Make `metadata()` fail, simulating a corrupt container.
    pub fn with_metadata_failure(mut self) -> Self {
        self.fail_metadata = true;
        self
    }

    /// Make `decode_frame_near` fail for this exact timestamp.
    pub fn with_decode_failure_at(mut self, timestamp_ms: u64) -> Self {
        self.fail_decode_at.push(timestamp_ms);
        self
    }

    /// Timestamps decoded so far, in call order.
    pub fn decoded_timestamps(&self) -> Vec<u64> {
        self.decoded.lock().clone()
    }

    fn scene_at(&self, timestamp_ms: u64) -> &Scene {
        self.scenes
            .iter()
            .rev()
            .find(|s| s.start_ms <= timestamp_ms)
            .unwrap_or(&self.scenes[0])
    }
}

impl VideoSource for ScriptedVideoSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> Result<VideoMetadata> {
        if self.fail_metadata {
            return Err(ScanError::MetadataUnavailable(format!(
                "cannot read container metadata for {}",
                self.id
            )));
        }
        Ok(VideoMetadata {
            duration_ms: self.duration_ms,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        })
    }

    fn decode_frame_near(&self, timestamp_ms: u64) -> Result<FrameBuffer> {
        self.decoded.lock().push(timestamp_ms);
        if self.fail_decode_at.contains(&timestamp_ms) {
            return Err(ScanError::Decode(format!(
                "scripted decode failure at {timestamp_ms}ms"
            )));
        }
        let scene = self.scene_at(timestamp_ms);
        let (w, h) = scene.size.unwrap_or((self.width, self.height));
        Ok(FrameBuffer::solid(
            w,
            h,
            scene.color[0],
            scene.color[1],
            scene.color[2],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_script_switches_colors() {
        let source = ScriptedVideoSource::new("clip.mp4", 60_000, 64, 64)
            .with_scene_change_at(30_000, [250, 10, 10]);

        let before = source.decode_frame_near(10_000).unwrap();
        let after = source.decode_frame_near(40_000).unwrap();
        assert_eq!(&before.primary_plane().row(0)[0..3], &[128, 128, 128]);
        assert_eq!(&after.primary_plane().row(0)[0..3], &[250, 10, 10]);
        assert_eq!(source.decoded_timestamps(), vec![10_000, 40_000]);
    }

    #[test]
    fn metadata_failure_is_reported() {
        let source = ScriptedVideoSource::new("bad.mp4", 1_000, 64, 64).with_metadata_failure();
        assert!(matches!(
            source.metadata(),
            Err(ScanError::MetadataUnavailable(_))
        ));
    }

    #[test]
    fn resolution_change_applies() {
        let source =
            ScriptedVideoSource::new("rotate.mp4", 60_000, 64, 48).with_resolution_change_at(
                20_000, 48, 64,
            );
        let frame = source.decode_frame_near(25_000).unwrap();
        assert_eq!((frame.width, frame.height), (48, 64));
    }
}
