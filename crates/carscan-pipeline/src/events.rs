//! Progress event stream.
//!
//! One tagged union covers a whole run end-to-end; consumers subscribe
//! through a [`ProgressSink`] and the pipeline has no opinion on how events
//! are rendered.

use crate::result::{FrameAnalysisResult, VideoAnalysisResult};
use serde::Serialize;

/// Events emitted over the lifetime of one run.
///
/// `ExtractionProgress` fractions are non-decreasing. `FrameProcessed` may
/// arrive out of frame-index order; `processed` is the running completion
/// count. `Completed` and `Error` are terminal and mutually exclusive.
#[derive(Debug, Clone, Serialize)]
pub enum PipelineEvent {
    ExtractionStarted { duration_ms: u64 },
    ExtractionProgress { fraction: f32 },
    FrameProcessed {
        processed: usize,
        result: FrameAnalysisResult,
    },
    Completed { result: VideoAnalysisResult },
    Error { message: String },
}

/// Consumer of the pipeline's event stream.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: PipelineEvent);
}

/// Adapter turning a closure into a sink.
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: PipelineEvent) {
        (self.0)(event)
    }
}

/// Discards every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&self, _event: PipelineEvent) {}
}

/// Bridges events onto a crossbeam channel for synchronous consumers
/// (UI threads, telemetry workers).
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<PipelineEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver to drain it from.
    pub fn new() -> (Self, crossbeam_channel::Receiver<PipelineEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_event(&self, event: PipelineEvent) {
        // A hung-up receiver just means nobody is watching anymore.
        let _ = self.tx.send(event);
    }
}
