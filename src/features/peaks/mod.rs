//! Streaming cardiac peak detection
//!
//! Two stages run once per envelope sample on the ingest path:
//! - [`detector::PeakDetector`]: adaptive-threshold 3-tap local maximum
//! - [`validator::PeakValidator`]: S1/S2 labeling from inter-peak timing

pub mod detector;
pub mod validator;

use serde::{Deserialize, Serialize};

pub use detector::PeakDetector;
pub use validator::PeakValidator;

/// Semantic label of an envelope peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeakLabel {
    /// Raw candidate, or ambiguous after validation
    Unvalidated,
    /// First heart sound, marks cycle onset
    S1,
    /// Second heart sound
    S2,
}

/// Envelope peak, raw from the detector or labeled by the validator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakEvent {
    /// Envelope value at the peak
    pub value: f32,

    /// Absolute sample index of the peak
    pub global_index: i64,

    /// Semantic label
    pub label: PeakLabel,
}

impl PeakEvent {
    /// Raw, not yet validated candidate
    pub fn candidate(value: f32, global_index: i64) -> Self {
        Self {
            value,
            global_index,
            label: PeakLabel::Unvalidated,
        }
    }

    /// True for validated first heart sounds
    pub fn is_s1(&self) -> bool {
        self.label == PeakLabel::S1
    }
}
