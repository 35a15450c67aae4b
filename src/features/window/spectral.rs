//! Heart-sound spectral features
//!
//! RMS and spectral centroid over a fixed-size sub-window centred on each
//! S1/S2 sample. The FFT plan and Hann table are built once for the configured
//! size and reused for every window.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::error::DspError;

/// Total magnitude below which the centroid is reported as 0
const MIN_TOTAL_MAGNITUDE: f32 = 1e-6;

/// Root mean square, 0 for an empty slice
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Symmetric Hann window of length `n`
///
/// `w[i] = 0.5 * (1 - cos(2πi / (n - 1)))`, so both ends are exactly 0.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32;
            0.5 * (1.0 - t.cos())
        })
        .collect()
}

/// Borrow the `size`-sample sub-window centred on `center`
///
/// The range `[center - size/2, center + size/2)` is clipped to the audio.
/// Anything but an exact `size`-sample result is rejected, the caller skips
/// the feature instead of computing it on a truncated window. `size` must be
/// even; an odd size never yields an exact window.
///
/// # Errors
///
/// Returns `DspError::SubWindowMismatch` when clipping shortens the range.
pub fn extract_fixed_window(audio: &[f32], center: usize, size: usize) -> Result<&[f32], DspError> {
    let half = size / 2;
    let start = center.saturating_sub(half);
    let end = center.saturating_add(half).min(audio.len());
    let actual = end.saturating_sub(start);
    if actual != size {
        return Err(DspError::SubWindowMismatch {
            expected: size,
            actual,
        });
    }
    Ok(&audio[start..end])
}

/// Pre-planned spectral centroid calculator
pub struct SpectralAnalyser {
    size: usize,
    sample_rate: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl fmt::Debug for SpectralAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyser")
            .field("size", &self.size)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SpectralAnalyser {
    /// Plan a forward FFT of `size` points
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidConfig` for a zero sample rate or a size that
    /// is zero or odd.
    pub fn new(size: usize, sample_rate: u32) -> Result<Self, DspError> {
        if size == 0 || sample_rate == 0 {
            return Err(DspError::InvalidConfig(format!(
                "spectral analyser needs size > 0 and sample_rate > 0, got {} / {}",
                size, sample_rate
            )));
        }
        if size % 2 != 0 {
            return Err(DspError::InvalidConfig(format!(
                "spectral analyser size must be even, got {}",
                size
            )));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            size,
            sample_rate: sample_rate as f32,
            fft,
            window: hann_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
        })
    }

    /// Sub-window length this analyser was planned for
    pub fn size(&self) -> usize {
        self.size
    }

    /// Magnitude-weighted mean frequency in Hz
    ///
    /// Hann-windows the input, takes the FFT and computes
    /// `Σ f_k·|X_k| / Σ |X_k|` over bins `0..=N/2` with `f_k = k·fs/N`.
    ///
    /// # Errors
    ///
    /// Returns `DspError::SubWindowMismatch` when `samples.len() != size`.
    pub fn centroid(&mut self, samples: &[f32]) -> Result<f32, DspError> {
        if samples.len() != self.size {
            return Err(DspError::SubWindowMismatch {
                expected: self.size,
                actual: samples.len(),
            });
        }

        for ((slot, &x), &w) in self.buffer.iter_mut().zip(samples).zip(&self.window) {
            *slot = Complex::new(x * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let bin_hz = self.sample_rate / self.size as f32;
        let mut weighted = 0.0f64;
        let mut total = 0.0f64;
        for (k, bin) in self.buffer.iter().take(self.size / 2 + 1).enumerate() {
            let mag = bin.norm() as f64;
            weighted += k as f64 * bin_hz as f64 * mag;
            total += mag;
        }

        if (total as f32) < MIN_TOTAL_MAGNITUDE {
            return Ok(0.0);
        }
        Ok((weighted / total) as f32)
    }
}
