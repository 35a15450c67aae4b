//! Per-cycle window analysis
//!
//! Runs once per extracted cardiac-cycle window:
//! - Short-time energy and hard-limiting ([`ste`])
//! - STE peak picking and de-clustering ([`peak_picking`])
//! - Positional S1/S2 labeling and audio remapping ([`labeling`])
//! - RMS and spectral centroid around each heart sound ([`spectral`])
//!
//! [`analyser::WindowAnalyser`] ties the stages together and owns all scratch
//! buffers, so a steady-state pass does not allocate beyond the report.

pub mod analyser;
pub mod labeling;
pub mod peak_picking;
pub mod spectral;
pub mod ste;

use serde::{Deserialize, Serialize};

pub use analyser::WindowAnalyser;

/// Label of an STE peak inside one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowPeakLabel {
    /// Accepted by peak picking, not the tallest of its cluster
    Unvalidated,
    /// Tallest of its cluster, eligible for S1/S2 pairing
    Candidate,
    /// First heart sound of the window
    S1,
    /// Second heart sound of the window
    S2,
    /// Candidate that did not make the chosen pair
    Other,
}

/// STE peak found inside a cardiac window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowPeak {
    /// Index into the STE series
    pub ste_index: usize,

    /// Sample index of max |x| in the peak's STE block, relative to the window
    /// start. Only meaningful for S1/S2.
    pub audio_index: usize,

    /// STE value at the peak
    pub value: f32,

    /// Current label
    pub label: WindowPeakLabel,

    /// RMS of the sub-window around `audio_index` (0 until computed)
    pub rms: f32,

    /// Spectral centroid in Hz of the same sub-window (0 until computed)
    pub centroid: f32,
}

impl WindowPeak {
    /// Fresh peak straight out of peak picking
    pub fn new(ste_index: usize, value: f32) -> Self {
        Self {
            ste_index,
            audio_index: 0,
            value,
            label: WindowPeakLabel::Unvalidated,
            rms: 0.0,
            centroid: 0.0,
        }
    }

    /// True for S1 or S2
    pub fn is_heart_sound(&self) -> bool {
        matches!(self.label, WindowPeakLabel::S1 | WindowPeakLabel::S2)
    }
}
