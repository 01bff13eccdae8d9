//! Adaptive frame sampling.
//!
//! Walks a video's timeline in fixed probe steps, decoding the nearest frame
//! at each step, and keeps a frame when it is the first of the run, visually
//! distinct from the previously kept frame, or on an interval boundary.
//! Everything else is decoded, scored and dropped immediately.
//!
//! Each call to [`FrameSampler::extract`] is a fresh decode pass — the
//! resulting sequence is finite, ordered and non-restartable.

use crate::cancel::CancelHandle;
use crate::source::VideoSource;
use carscan_core::{FrameBuffer, Result, ScanError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Why a frame was included in the sample set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionReason {
    /// First frame of the run, always kept.
    FirstFrame,
    /// Kept because the timestamp landed on an interval boundary.
    TimeInterval,
    /// Kept because the frame differs visually from the last kept frame.
    VisualChange,
}

/// A sampled frame handed to the pipeline.
///
/// The sampler owns the buffer until the frame is emitted; after that the
/// receiver is responsible for releasing it once analysis and any derived
/// copies are complete.
#[derive(Debug)]
pub struct FrameData {
    /// Position in the emitted sequence, contiguous from 0.
    pub frame_index: u32,
    /// Offset into the video.
    pub timestamp_ms: u64,
    /// Decoded frame pixels.
    pub image: FrameBuffer,
    /// Why this frame was kept.
    pub reason: ExtractionReason,
}

/// Sampling parameters.
///
/// The difference thresholds are empirical defaults, not fixed semantics —
/// tune them per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Frames on these boundaries are always kept (default 30 s).
    pub interval_ms: u64,
    /// Timeline walk granularity; must divide `interval_ms` (default 10 s).
    pub probe_step_ms: u64,
    /// Compare every Nth pixel on both axes (default 10).
    pub pixel_stride: u32,
    /// A sampled pixel pair differs when any RGB channel deviates by more
    /// than this (default 30).
    pub channel_threshold: u8,
    /// Keep a frame when more than this fraction of sampled pixels differ
    /// (default 0.30).
    pub change_fraction: f32,
    /// The tail frame is decoded this far before the end (default 1 s).
    pub tail_backoff_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            probe_step_ms: 10_000,
            pixel_stride: 10,
            channel_threshold: 30,
            change_fraction: 0.30,
            tail_backoff_ms: 1_000,
        }
    }
}

impl SamplerConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 || self.probe_step_ms == 0 {
            return Err(ScanError::InvalidParameter(
                "sampler intervals must be non-zero".into(),
            ));
        }
        if self.interval_ms % self.probe_step_ms != 0 {
            return Err(ScanError::InvalidParameter(format!(
                "probe step {}ms must divide interval {}ms",
                self.probe_step_ms, self.interval_ms
            )));
        }
        if self.pixel_stride == 0 {
            return Err(ScanError::InvalidParameter(
                "pixel stride must be non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.change_fraction) {
            return Err(ScanError::InvalidParameter(format!(
                "change fraction {} outside [0, 1]",
                self.change_fraction
            )));
        }
        Ok(())
    }
}

/// What one extraction pass did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExtractionSummary {
    /// Frames handed to the caller.
    pub frames_emitted: usize,
    /// Frames decoded, including ones scored and discarded.
    pub frames_decoded: usize,
    /// Duration reported by the source.
    pub duration_ms: u64,
}

/// Fraction of grid-sampled pixels that differ between two frames.
///
/// Samples every `pixel_stride`-th pixel on both axes and counts pairs where
/// any RGB channel deviates by more than `channel_threshold`. Returns a value
/// in `[0.0, 1.0]`. Frames with mismatched dimensions score maximal
/// difference — a mid-video resolution change always reads as a new view.
pub fn visual_difference(
    a: &FrameBuffer,
    b: &FrameBuffer,
    pixel_stride: u32,
    channel_threshold: u8,
) -> f32 {
    if a.width != b.width || a.height != b.height {
        return 1.0;
    }
    if a.width == 0 || a.height == 0 {
        return 0.0;
    }

    let a_plane = a.primary_plane();
    let b_plane = b.primary_plane();
    let stride = pixel_stride.max(1);
    let threshold = channel_threshold as i16;

    let mut sampled: u32 = 0;
    let mut differing: u32 = 0;

    let mut y = 0;
    while y < a.height {
        let a_row = a_plane.row(y);
        let b_row = b_plane.row(y);
        let mut x = 0usize;
        while x < a.width as usize {
            let base = x * 4;
            let changed = (0..3).any(|c| {
                let da = a_row[base + c] as i16 - b_row[base + c] as i16;
                da.abs() > threshold
            });
            sampled += 1;
            if changed {
                differing += 1;
            }
            x += stride as usize;
        }
        y += stride;
    }

    if sampled == 0 {
        return 0.0;
    }
    differing as f32 / sampled as f32
}

/// Adaptive frame sampler.
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    /// Create a sampler, validating the configuration.
    pub fn new(config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Run one extraction pass.
    ///
    /// `on_frame` receives each kept frame as it is produced, taking
    /// ownership of the buffer. `on_progress` receives a `0.0..=1.0`
    /// fraction after every probe step and exactly `1.0` at completion.
    ///
    /// Cancellation stops the walk between steps; frames already emitted
    /// stand. A zero-length or unreadable video fails with
    /// [`ScanError::MetadataUnavailable`] before any frame is emitted.
    pub fn extract(
        &self,
        source: &dyn VideoSource,
        cancel: &CancelHandle,
        mut on_frame: impl FnMut(FrameData),
        mut on_progress: impl FnMut(f32),
    ) -> Result<ExtractionSummary> {
        let meta = source.metadata()?;
        if meta.duration_ms == 0 {
            return Err(ScanError::MetadataUnavailable(format!(
                "zero-length video: {}",
                source.id()
            )));
        }
        let duration = meta.duration_ms;
        let cfg = &self.config;

        let mut frames_decoded = 0usize;
        let mut frames_emitted = 0usize;
        let mut next_index: u32 = 0;
        // Last kept frame, retained for visual comparison.
        let mut reference: Option<FrameBuffer> = None;
        let mut last_kept_ts: u64 = 0;

        let mut t: u64 = 0;
        while t <= duration {
            if cancel.is_cancelled() {
                debug!(timestamp_ms = t, "extraction cancelled");
                break;
            }

            match source.decode_frame_near(t) {
                Ok(image) => {
                    frames_decoded += 1;
                    let reason = self.classify(&image, reference.as_ref(), t);
                    if let Some(reason) = reason {
                        reference = Some(image.clone());
                        last_kept_ts = t;
                        on_frame(FrameData {
                            frame_index: next_index,
                            timestamp_ms: t,
                            image,
                            reason,
                        });
                        next_index += 1;
                        frames_emitted += 1;
                    }
                    // A discarded frame's buffer is dropped here.
                }
                Err(e) => {
                    warn!(timestamp_ms = t, error = %e, "frame decode failed, skipping");
                }
            }

            on_progress((t as f32 / duration as f32).min(1.0));
            t = t.saturating_add(cfg.probe_step_ms);
        }

        // Tail frame: make sure the end of the video is represented.
        if !cancel.is_cancelled() {
            if let Some(tail) = self.tail_frame(
                source,
                duration,
                frames_emitted,
                last_kept_ts,
                reference.as_ref(),
                next_index,
            ) {
                frames_decoded += 1;
                frames_emitted += 1;
                on_frame(tail);
            }
        }

        on_progress(1.0);
        debug!(
            video = source.id(),
            emitted = frames_emitted,
            decoded = frames_decoded,
            "extraction pass complete"
        );

        Ok(ExtractionSummary {
            frames_emitted,
            frames_decoded,
            duration_ms: duration,
        })
    }

    /// Collect an entire pass into a vector.
    pub fn extract_all(
        &self,
        source: &dyn VideoSource,
        cancel: &CancelHandle,
    ) -> Result<(Vec<FrameData>, ExtractionSummary)> {
        let mut frames = Vec::new();
        let summary = self.extract(source, cancel, |f| frames.push(f), |_| {})?;
        Ok((frames, summary))
    }

    /// Decide whether a decoded frame is kept, and why.
    fn classify(
        &self,
        image: &FrameBuffer,
        reference: Option<&FrameBuffer>,
        timestamp_ms: u64,
    ) -> Option<ExtractionReason> {
        let cfg = &self.config;
        let reference = match reference {
            None => return Some(ExtractionReason::FirstFrame),
            Some(r) => r,
        };

        let score = visual_difference(image, reference, cfg.pixel_stride, cfg.channel_threshold);
        if score > cfg.change_fraction {
            debug!(timestamp_ms, score, "visual change detected");
            return Some(ExtractionReason::VisualChange);
        }
        if timestamp_ms % cfg.interval_ms == 0 {
            return Some(ExtractionReason::TimeInterval);
        }
        None
    }

    /// Decode a final frame near the end when the walk left the tail of the
    /// video unrepresented.
    ///
    /// Long videos get a tail frame when the last kept frame is more than
    /// one interval from the end. Videos shorter than one interval get one
    /// only when it is visually distinct from the first frame.
    fn tail_frame(
        &self,
        source: &dyn VideoSource,
        duration: u64,
        frames_emitted: usize,
        last_kept_ts: u64,
        reference: Option<&FrameBuffer>,
        next_index: u32,
    ) -> Option<FrameData> {
        let cfg = &self.config;
        if frames_emitted == 0 {
            return None;
        }
        let tail_ts = duration.saturating_sub(cfg.tail_backoff_ms);
        if tail_ts <= last_kept_ts {
            return None;
        }

        if duration >= cfg.interval_ms {
            if duration - last_kept_ts <= cfg.interval_ms {
                return None;
            }
            match source.decode_frame_near(tail_ts) {
                Ok(image) => Some(FrameData {
                    frame_index: next_index,
                    timestamp_ms: tail_ts,
                    image,
                    reason: ExtractionReason::TimeInterval,
                }),
                Err(e) => {
                    warn!(timestamp_ms = tail_ts, error = %e, "tail frame decode failed");
                    None
                }
            }
        } else {
            // Short video: keep the tail only if it shows something new.
            let image = match source.decode_frame_near(tail_ts) {
                Ok(image) => image,
                Err(e) => {
                    warn!(timestamp_ms = tail_ts, error = %e, "tail frame decode failed");
                    return None;
                }
            };
            let reference = reference?;
            let score =
                visual_difference(&image, reference, cfg.pixel_stride, cfg.channel_threshold);
            if score > cfg.change_fraction {
                Some(FrameData {
                    frame_index: next_index,
                    timestamp_ms: tail_ts,
                    image,
                    reason: ExtractionReason::VisualChange,
                })
            } else {
                None
            }
        }
    }
}
