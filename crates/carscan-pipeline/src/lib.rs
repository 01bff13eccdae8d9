//! CarScan Pipeline - video analysis orchestration
//!
//! Drives the frame sampler, fans sampled frames out to the damage
//! analyzer concurrently, assembles ordered results under a memory budget,
//! and reports progress through a single event stream:
//!
//! `ExtractionStarted -> {ExtractionProgress, FrameProcessed}* ->
//! Completed | Error`

pub mod events;
pub mod pipeline;
pub mod result;

pub use events::{ChannelSink, FnSink, NullSink, PipelineEvent, ProgressSink};
pub use pipeline::{run_pipeline, AnalysisPipeline, PipelineConfig};
pub use result::{FrameAnalysisResult, VideoAnalysisResult};
