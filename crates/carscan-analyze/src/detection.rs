//! Damage detection records.

use carscan_core::Rect;
use serde::{Deserialize, Serialize};

/// Class of vehicle damage a detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Scratch,
    Dent,
    Crack,
    GlassShatter,
    LampBroken,
    TireFlat,
}

impl DamageType {
    /// Display name for reports and UIs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Scratch => "Scratch",
            Self::Dent => "Dent",
            Self::Crack => "Crack",
            Self::GlassShatter => "Shattered glass",
            Self::LampBroken => "Broken lamp",
            Self::TireFlat => "Flat tire",
        }
    }
}

/// Assessed severity of a single detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

/// One detected damage region in a frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Detection {
    /// Damage class.
    pub damage_type: DamageType,
    /// Detector confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Bounding box in frame coordinates.
    pub bbox: Rect,
    /// Assessed severity.
    pub severity: Severity,
}
