//! Analysis result types

use serde::{Deserialize, Serialize};

use crate::features::window::WindowPeak;

/// Features of one heart sound inside a cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartSoundFeatures {
    /// Absolute sample index of the sound's max |x|
    pub audio_index: i64,

    /// RMS over the spectral sub-window
    pub rms: f32,

    /// Spectral centroid in Hz over the same sub-window
    pub centroid: f32,
}

/// Outcome of analysing one cardiac-cycle window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Absolute sample index of the first window sample
    pub window_start_index: i64,

    /// Window start in milliseconds since stream start
    pub timestamp_ms: u32,

    /// Window length in samples
    pub window_len: usize,

    /// Number of STE blocks
    pub ste_len: usize,

    /// Every STE peak with its final label
    pub peaks: Vec<WindowPeak>,

    /// First heart sound, when labeled and its sub-window fit
    pub s1: Option<HeartSoundFeatures>,

    /// Second heart sound, when labeled and its sub-window fit
    pub s2: Option<HeartSoundFeatures>,
}

impl CycleReport {
    /// A cycle that produced no S1 features
    pub fn is_missed(&self) -> bool {
        self.s1.is_none()
    }

    /// Transport record for the S1 of this cycle
    pub fn s1_record(&self) -> Option<FeatureRecord> {
        self.s1.map(|f| FeatureRecord {
            rms: f.rms,
            centroid: f.centroid,
            timestamp_ms: self.timestamp_ms,
        })
    }
}

/// Record handed to the transport for every analysed S1
///
/// Field order and widths match the 12-byte notification payload
/// (`f32`, `f32`, `u32`, little endian).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// S1 RMS
    pub rms: f32,

    /// S1 spectral centroid in Hz
    pub centroid: f32,

    /// Cycle timestamp in milliseconds
    pub timestamp_ms: u32,
}

impl FeatureRecord {
    /// Packed little-endian wire form
    pub fn to_le_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.rms.to_le_bytes());
        out[4..8].copy_from_slice(&self.centroid.to_le_bytes());
        out[8..12].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        out
    }
}

/// Slope and alert state of one tracked feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    /// Samples currently buffered
    pub count: usize,

    /// Least-squares slope per millisecond, `None` while warming up
    pub slope: Option<f32>,

    /// Slope is available and below the alert threshold
    pub alert: bool,
}

/// Alert state of the four tracked features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrendAlerts {
    /// S1 RMS declining
    pub s1_rms: bool,
    /// S1 centroid declining
    pub s1_centroid: bool,
    /// S2 RMS declining
    pub s2_rms: bool,
    /// S2 centroid declining
    pub s2_centroid: bool,
}

impl TrendAlerts {
    /// Single-byte alert code, bit 0 S1 RMS through bit 3 S2 centroid
    pub fn code(&self) -> u8 {
        (self.s1_rms as u8)
            | (self.s1_centroid as u8) << 1
            | (self.s2_rms as u8) << 2
            | (self.s2_centroid as u8) << 3
    }

    /// Inverse of [`Self::code`], upper bits ignored
    pub fn from_code(code: u8) -> Self {
        Self {
            s1_rms: code & 0b0001 != 0,
            s1_centroid: code & 0b0010 != 0,
            s2_rms: code & 0b0100 != 0,
            s2_centroid: code & 0b1000 != 0,
        }
    }

    /// Any feature in alert
    pub fn any(&self) -> bool {
        self.code() != 0
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Audio blocks written into the ring store
    pub blocks_ingested: u64,
    /// Audio blocks lost to a full queue or rejected as malformed
    pub blocks_dropped: u64,
    /// Raw detector candidates
    pub peaks_detected: u64,
    /// Validator outputs labeled S1
    pub peaks_s1: u64,
    /// Validator outputs labeled S2
    pub peaks_s2: u64,
    /// Validator outputs left unvalidated
    pub peaks_unvalidated: u64,
    /// Validated events lost to a full peak queue
    pub peak_events_dropped: u64,
    /// Cardiac windows copied out of the ring store
    pub windows_extracted: u64,
    /// Windows skipped (aged out, out of range, too long, bad period)
    pub windows_dropped: u64,
    /// Windows run through window analysis
    pub cycles_analysed: u64,
    /// Analysed windows without S1 features
    pub missed_cycles: u64,
    /// Feature records accepted by the sink
    pub records_sent: u64,
    /// Feature records the sink refused
    pub records_dropped: u64,
}

/// Everything an offline run over a recording produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    /// Recording length in seconds
    pub duration_seconds: f32,

    /// Sample rate used for analysis
    pub sample_rate: u32,

    /// One report per extracted cardiac window, in stream order
    pub cycles: Vec<CycleReport>,

    /// S1 RMS trend at end of recording
    pub s1_rms_trend: TrendSnapshot,

    /// S1 centroid trend at end of recording
    pub s1_centroid_trend: TrendSnapshot,

    /// S2 RMS trend at end of recording
    pub s2_rms_trend: TrendSnapshot,

    /// S2 centroid trend at end of recording
    pub s2_centroid_trend: TrendSnapshot,

    /// Final alert state
    pub alerts: TrendAlerts,

    /// Pipeline counters
    pub stats: PipelineStats,
}

impl RecordingSummary {
    /// Cycles with S1 features
    pub fn analysed_cycles(&self) -> impl Iterator<Item = &CycleReport> {
        self.cycles.iter().filter(|c| !c.is_missed())
    }

    /// Mean interval between consecutive cycle starts, in beats per minute
    ///
    /// `None` with fewer than two cycles.
    pub fn heart_rate_bpm(&self) -> Option<f32> {
        if self.cycles.len() < 2 || self.sample_rate == 0 {
            return None;
        }
        let first = self.cycles.first()?.window_start_index;
        let last = self.cycles.last()?.window_start_index;
        let mean_period = (last - first) as f32 / (self.cycles.len() - 1) as f32;
        if mean_period <= 0.0 {
            return None;
        }
        Some(60.0 * self.sample_rate as f32 / mean_period)
    }
}
