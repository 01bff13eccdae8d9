//! CarScan Analyze - damage detection contract
//!
//! Defines what a damage detector reports (detection records with class,
//! confidence, box and severity) and the [`FrameAnalyzer`] trait the
//! pipeline fans frames out to. Model execution is an external collaborator.

pub mod analyzer;
pub mod detection;
pub mod error;

pub use analyzer::{AnalyzeContext, FrameAnalyzer, ScriptedAnalyzer};
pub use detection::{DamageType, Detection, Severity};
pub use error::{AnalyzeError, AnalyzeResult};
