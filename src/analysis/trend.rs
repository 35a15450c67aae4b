//! Rolling trend analysis and deterioration alerts
//!
//! Each tracked feature keeps the most recent `(timestamp, value)` pairs in a
//! fixed-capacity ring and reports the least-squares slope over them. A slope
//! below the configured (negative) threshold raises an alert.

use serde::{Deserialize, Serialize};

use super::result::{CycleReport, TrendAlerts, TrendSnapshot};
use crate::config::{TrendBankConfig, TrendConfig, TREND_MAX_BUFFER};
use crate::error::DspError;

/// Rolling least-squares slope of one feature
#[derive(Debug, Clone)]
pub struct TrendAnalyser {
    timestamps: [f64; TREND_MAX_BUFFER],
    values: [f32; TREND_MAX_BUFFER],
    buffer_size: usize,
    min_windows: usize,
    slope_alert_thresh: f32,
    write_idx: usize,
    count: usize,
}

impl TrendAnalyser {
    /// Create an empty analyser
    ///
    /// A `buffer_size` above [`TREND_MAX_BUFFER`] is clamped; zero is treated
    /// as one.
    pub fn new(config: &TrendConfig) -> Self {
        let buffer_size = config.buffer_size.clamp(1, TREND_MAX_BUFFER);
        if buffer_size != config.buffer_size {
            log::warn!(
                "Trend buffer size {} clamped to {}",
                config.buffer_size,
                buffer_size
            );
        }
        Self {
            timestamps: [0.0; TREND_MAX_BUFFER],
            values: [0.0; TREND_MAX_BUFFER],
            buffer_size,
            min_windows: config.min_windows,
            slope_alert_thresh: config.slope_alert_thresh,
            write_idx: 0,
            count: 0,
        }
    }

    /// Append a sample, overwriting the oldest once full
    pub fn update(&mut self, timestamp_ms: f64, value: f32) {
        self.timestamps[self.write_idx] = timestamp_ms;
        self.values[self.write_idx] = value;
        self.write_idx = (self.write_idx + 1) % self.buffer_size;
        if self.count < self.buffer_size {
            self.count += 1;
        }
    }

    /// Samples currently buffered
    pub fn count(&self) -> usize {
        self.count
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.write_idx = 0;
        self.count = 0;
    }

    /// Buffered `(timestamp, value)` pairs, oldest first
    pub fn samples(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        let start = (self.write_idx + self.buffer_size - self.count) % self.buffer_size;
        (0..self.count).map(move |i| {
            let idx = (start + i) % self.buffer_size;
            (self.timestamps[idx], self.values[idx])
        })
    }

    /// Least-squares slope of value over timestamp, in value units per ms
    ///
    /// All buffered timestamps being identical gives a slope of exactly 0.
    ///
    /// # Errors
    ///
    /// Returns `DspError::InsufficientData` while fewer than `min_windows`
    /// samples are buffered.
    pub fn get_slope(&self) -> Result<f32, DspError> {
        if self.count < self.min_windows || self.count == 0 {
            return Err(DspError::InsufficientData {
                have: self.count,
                need: self.min_windows.max(1),
            });
        }

        let n = self.count as f64;
        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
        for (x, y) in self.samples() {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            sum_x += x;
            sum_y += y as f64;
        }
        if x_min == x_max {
            return Ok(0.0);
        }

        // centred sums keep millisecond timestamps from cancelling out
        let mean_x = sum_x / n;
        let mean_y = sum_y / n;
        let (mut sxy, mut sxx) = (0.0f64, 0.0f64);
        for (x, y) in self.samples() {
            let dx = x - mean_x;
            sxy += dx * (y as f64 - mean_y);
            sxx += dx * dx;
        }
        if sxx == 0.0 {
            return Ok(0.0);
        }
        Ok((sxy / sxx) as f32)
    }

    /// Slope is available and below the alert threshold
    pub fn is_alert(&self) -> bool {
        match self.get_slope() {
            Ok(slope) => slope < self.slope_alert_thresh,
            Err(_) => false,
        }
    }

    /// Count, slope and alert in one value
    pub fn snapshot(&self) -> TrendSnapshot {
        let slope = self.get_slope().ok();
        TrendSnapshot {
            count: self.count,
            slope,
            alert: slope.is_some_and(|s| s < self.slope_alert_thresh),
        }
    }
}

/// Feature tracked by a [`TrendBank`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendFeature {
    /// S1 RMS
    S1Rms,
    /// S1 spectral centroid
    S1Centroid,
    /// S2 RMS
    S2Rms,
    /// S2 spectral centroid
    S2Centroid,
}

impl TrendFeature {
    /// All tracked features in alert-bit order
    pub const ALL: [TrendFeature; 4] = [
        TrendFeature::S1Rms,
        TrendFeature::S1Centroid,
        TrendFeature::S2Rms,
        TrendFeature::S2Centroid,
    ];
}

/// One [`TrendAnalyser`] per tracked heart-sound feature
#[derive(Debug, Clone)]
pub struct TrendBank {
    s1_rms: TrendAnalyser,
    s1_centroid: TrendAnalyser,
    s2_rms: TrendAnalyser,
    s2_centroid: TrendAnalyser,
}

impl TrendBank {
    /// Create four empty analysers
    pub fn new(config: &TrendBankConfig) -> Self {
        Self {
            s1_rms: TrendAnalyser::new(&config.s1_rms),
            s1_centroid: TrendAnalyser::new(&config.s1_centroid),
            s2_rms: TrendAnalyser::new(&config.s2_rms),
            s2_centroid: TrendAnalyser::new(&config.s2_centroid),
        }
    }

    /// Analyser for one feature
    pub fn get(&self, feature: TrendFeature) -> &TrendAnalyser {
        match feature {
            TrendFeature::S1Rms => &self.s1_rms,
            TrendFeature::S1Centroid => &self.s1_centroid,
            TrendFeature::S2Rms => &self.s2_rms,
            TrendFeature::S2Centroid => &self.s2_centroid,
        }
    }

    /// Mutable analyser for one feature
    pub fn get_mut(&mut self, feature: TrendFeature) -> &mut TrendAnalyser {
        match feature {
            TrendFeature::S1Rms => &mut self.s1_rms,
            TrendFeature::S1Centroid => &mut self.s1_centroid,
            TrendFeature::S2Rms => &mut self.s2_rms,
            TrendFeature::S2Centroid => &mut self.s2_centroid,
        }
    }

    /// Push the heart-sound features of an analysed cycle
    ///
    /// Sounds without features leave their analysers untouched.
    pub fn update_from_cycle(&mut self, report: &CycleReport) {
        let t = report.timestamp_ms as f64;
        if let Some(s1) = report.s1 {
            self.s1_rms.update(t, s1.rms);
            self.s1_centroid.update(t, s1.centroid);
        }
        if let Some(s2) = report.s2 {
            self.s2_rms.update(t, s2.rms);
            self.s2_centroid.update(t, s2.centroid);
        }
    }

    /// Current alert state of every feature
    pub fn alerts(&self) -> TrendAlerts {
        TrendAlerts {
            s1_rms: self.s1_rms.is_alert(),
            s1_centroid: self.s1_centroid.is_alert(),
            s2_rms: self.s2_rms.is_alert(),
            s2_centroid: self.s2_centroid.is_alert(),
        }
    }

    /// Single-byte alert code, see [`TrendAlerts::code`]
    pub fn alert_code(&self) -> u8 {
        self.alerts().code()
    }

    /// Drop all samples from every analyser
    pub fn clear(&mut self) {
        for feature in TrendFeature::ALL {
            self.get_mut(feature).clear();
        }
    }
}
