//! CarScan Media - video source contract and adaptive frame sampling
//!
//! Container parsing and codec work are external collaborators behind the
//! [`VideoSource`] trait; this crate owns the sampling policy that decides
//! which decoded frames the rest of the pipeline ever sees.

pub mod cancel;
pub mod sampler;
pub mod source;

pub use cancel::CancelHandle;
pub use sampler::{
    visual_difference, ExtractionReason, ExtractionSummary, FrameData, FrameSampler, SamplerConfig,
};
pub use source::{ScriptedVideoSource, VideoMetadata, VideoSource};
