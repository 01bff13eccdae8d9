//! Error types for CarScan.

use thiserror::Error;

/// Main error type for CarScan operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Video error: {0}")]
    Video(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Video metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Analyzer error: {0}")]
    Analyzer(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for CarScan operations.
pub type Result<T> = std::result::Result<T, ScanError>;
