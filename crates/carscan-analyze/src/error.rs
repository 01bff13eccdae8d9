//! Error types for the analyzer boundary.

use thiserror::Error;

/// Errors an analyzer implementation may surface.
///
/// The pipeline converts every one of these into a per-frame error record;
/// they never abort a run.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The frame could not be prepared for inference.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The underlying detector failed on this frame.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The analyzer is not ready to serve requests.
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for analyzer operations.
pub type AnalyzeResult<T> = std::result::Result<T, AnalyzeError>;
