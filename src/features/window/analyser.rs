//! Window analysis orchestrator
//!
//! One [`WindowAnalyser`] per analysis worker. Scratch buffers and the FFT plan
//! are private to it and reused across windows.

use super::labeling::{label_s1_s2, remap_to_audio, PairingRules};
use super::peak_picking::{find_peaks_window, remove_close_peaks};
use super::spectral::{extract_fixed_window, rms, SpectralAnalyser};
use super::ste::{compute_ste_into, hard_limit, mean};
use super::WindowPeak;
use crate::analysis::result::{CycleReport, HeartSoundFeatures};
use crate::config::WindowAnalysisConfig;
use crate::error::DspError;

/// Convert an absolute sample index to milliseconds, saturating at `u32::MAX`
pub fn sample_index_to_ms(index: i64, sample_rate: u32) -> u32 {
    if index <= 0 || sample_rate == 0 {
        return 0;
    }
    let ms = index as u128 * 1000 / sample_rate as u128;
    u32::try_from(ms).unwrap_or(u32::MAX)
}

/// Per-cycle STE / labeling / feature pipeline
#[derive(Debug)]
pub struct WindowAnalyser {
    config: WindowAnalysisConfig,
    sample_rate: u32,
    spectral: SpectralAnalyser,
    limited: Vec<f32>,
    ste: Vec<f32>,
    limited_ste: Vec<f32>,
    peaks: Vec<WindowPeak>,
}

impl WindowAnalyser {
    /// Build an analyser for windows sampled at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidConfig` for a zero STE block size or an
    /// unusable spectral sub-window.
    pub fn new(config: &WindowAnalysisConfig, sample_rate: u32) -> Result<Self, DspError> {
        if config.ste_block_size == 0 {
            return Err(DspError::InvalidConfig(
                "window.ste_block_size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            config: config.clone(),
            sample_rate,
            spectral: SpectralAnalyser::new(config.spectral_window, sample_rate)?,
            limited: Vec::new(),
            ste: Vec::new(),
            limited_ste: Vec::new(),
            peaks: Vec::with_capacity(config.max_window_peaks),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &WindowAnalysisConfig {
        &self.config
    }

    /// Analyse one cardiac window
    ///
    /// # Arguments
    ///
    /// * `window` - Filtered audio of one cycle
    /// * `window_start_index` - Absolute sample index of `window[0]`
    ///
    /// # Returns
    ///
    /// A report with every STE peak and, when a pair was labeled and its
    /// sub-windows fit inside the window, S1/S2 features. A report without S1
    /// is a missed cycle, not an error.
    pub fn analyse(&mut self, window: &[f32], window_start_index: i64) -> CycleReport {
        let block_size = self.config.ste_block_size;

        self.limited.clear();
        self.limited.extend_from_slice(window);
        if let Some(factor) = self.config.audio_hl_thresh {
            hard_limit(&mut self.limited, factor);
        }

        compute_ste_into(&self.limited, block_size, &mut self.ste);
        let ste_len = self.ste.len();
        // threshold comes from the STE before its own hard limit
        let ste_mean = mean(&self.ste);

        self.limited_ste.clear();
        self.limited_ste.extend_from_slice(&self.ste);
        if let Some(factor) = self.config.ste_hl_thresh {
            hard_limit(&mut self.limited_ste, factor);
        }

        find_peaks_window(
            &self.limited_ste,
            ste_mean * self.config.peak_thresh_scale,
            self.config.peak_min_distance,
            self.config.max_window_peaks,
            &mut self.peaks,
        );

        let min_gap = (self.config.de_cluster_window_r * ste_len as f32) as usize;
        remove_close_peaks(&mut self.peaks, min_gap);

        let rules = PairingRules {
            reject_r: self.config.ident_s1_reject_r,
            gap_r: self.config.ident_s1_s2_gap_r,
            gap_tol: self.config.ident_s1_s2_gap_tol,
        };
        let pair = label_s1_s2(&mut self.peaks, ste_len, &rules);

        let mut s1 = None;
        let mut s2 = None;
        if let Some((s1_pos, s2_pos)) = pair {
            s1 = self.heart_sound(window, window_start_index, s1_pos);
            s2 = self.heart_sound(window, window_start_index, s2_pos);
        }

        let report = CycleReport {
            window_start_index,
            timestamp_ms: sample_index_to_ms(window_start_index, self.sample_rate),
            window_len: window.len(),
            ste_len,
            peaks: self.peaks.clone(),
            s1,
            s2,
        };

        if report.is_missed() {
            log::debug!(
                "Missed cycle at sample {} ({} samples, {} STE peaks)",
                window_start_index,
                window.len(),
                report.peaks.len()
            );
        }

        report
    }

    fn heart_sound(
        &mut self,
        window: &[f32],
        window_start_index: i64,
        pos: usize,
    ) -> Option<HeartSoundFeatures> {
        let block_size = self.config.ste_block_size;
        let peak = &mut self.peaks[pos];
        peak.audio_index = remap_to_audio(window, peak.ste_index, block_size);

        let sub = match extract_fixed_window(window, peak.audio_index, self.spectral.size()) {
            Ok(sub) => sub,
            Err(e) => {
                log::debug!(
                    "{:?} at window offset {} skipped: {}",
                    peak.label,
                    peak.audio_index,
                    e
                );
                return None;
            }
        };

        let peak_rms = rms(sub);
        let centroid = match self.spectral.centroid(sub) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Centroid failed for {:?}: {}", peak.label, e);
                return None;
            }
        };
        peak.rms = peak_rms;
        peak.centroid = centroid;

        Some(HeartSoundFeatures {
            audio_index: window_start_index + peak.audio_index as i64,
            rms: peak_rms,
            centroid,
        })
    }
}
