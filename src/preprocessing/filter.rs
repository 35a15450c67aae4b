//! Biquad cascade filtering
//!
//! Block-oriented IIR filtering in transposed direct form II. Coefficients
//! use the CMSIS-DSP layout `[b0, b1, b2, -a1, -a2]` per stage so tables
//! exported for CMSIS `arm_biquad_cascade_df2T_f32` can be used unchanged. Section state is
//! kept between calls, so consecutive blocks filter as one continuous
//! signal.
//!
//! # Example
//!
//! ```
//! use phono_dsp::preprocessing::filter::{BiquadCascade, BlockFilter};
//!
//! // single pass-through stage
//! let mut filter = BiquadCascade::new(&[[1.0, 0.0, 0.0, 0.0, 0.0]])?;
//! let input = [0.25f32, -0.5, 1.0];
//! let mut output = [0.0f32; 3];
//! filter.process(&input, &mut output);
//! assert_eq!(output, input);
//! # Ok::<(), phono_dsp::DspError>(())
//! ```

use crate::error::DspError;

/// Fixed-length block filter
///
/// The seam where a vendor DSP library can replace the default cascade.
pub trait BlockFilter {
    /// Filter `input` into `output` (same length), advancing internal state
    fn process(&mut self, input: &[f32], output: &mut [f32]);

    /// Clear internal state
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    d1: f64,
    d2: f64,
}

impl Section {
    fn from_cmsis(c: &[f32; 5]) -> Self {
        Self {
            b0: c[0] as f64,
            b1: c[1] as f64,
            b2: c[2] as f64,
            a1: c[3] as f64,
            a2: c[4] as f64,
            d1: 0.0,
            d2: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.d1;
        self.d1 = self.b1 * x + self.a1 * y + self.d2;
        self.d2 = self.b2 * x + self.a2 * y;
        y
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone)]
pub struct BiquadCascade {
    sections: Vec<Section>,
}

impl BiquadCascade {
    /// Build from CMSIS-layout coefficients, one `[b0, b1, b2, -a1, -a2]` per stage
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidConfig` for an empty table or non-finite
    /// coefficients
    pub fn new(stages: &[[f32; 5]]) -> Result<Self, DspError> {
        if stages.is_empty() {
            return Err(DspError::InvalidConfig(
                "Biquad cascade needs at least one stage".to_string(),
            ));
        }
        if stages.iter().flatten().any(|c| !c.is_finite()) {
            return Err(DspError::InvalidConfig(
                "Biquad coefficients must be finite".to_string(),
            ));
        }
        log::debug!("Building biquad cascade with {} stages", stages.len());
        Ok(Self {
            sections: stages.iter().map(Section::from_cmsis).collect(),
        })
    }

    /// Number of second-order stages
    pub fn num_stages(&self) -> usize {
        self.sections.len()
    }
}

impl BlockFilter for BiquadCascade {
    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            let mut v = x as f64;
            for section in self.sections.iter_mut() {
                v = section.tick(v);
            }
            *out = v as f32;
        }
    }

    fn reset(&mut self) {
        for section in self.sections.iter_mut() {
            section.d1 = 0.0;
            section.d2 = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use std::f32::consts::PI;

    fn tone(freq: f32, fs: f32, len: usize) -> Vec<f32> {
        (0..len).map(|i| (2.0 * PI * freq * i as f32 / fs).sin()).collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(BiquadCascade::new(&[]).is_err());
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(BiquadCascade::new(&[[f32::NAN, 0.0, 0.0, 0.0, 0.0]]).is_err());
    }

    #[test]
    fn test_block_split_matches_single_pass() {
        let config = FilterConfig::default();
        let signal = tone(80.0, 16000.0, 4000);

        let mut whole = BiquadCascade::new(&config.bandpass).unwrap();
        let mut expected = vec![0.0; signal.len()];
        whole.process(&signal, &mut expected);

        let mut split = BiquadCascade::new(&config.bandpass).unwrap();
        let mut actual = vec![0.0; signal.len()];
        for (inp, out) in signal.chunks(1600).zip(actual.chunks_mut(1600)) {
            split.process(inp, out);
        }
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_default_bandpass_passes_heart_band() {
        let config = FilterConfig::default();
        let fs = 16000.0;
        let len = 32000;

        let mut filter = BiquadCascade::new(&config.bandpass).unwrap();
        let in_band = tone(70.0, fs, len);
        let mut out_in = vec![0.0; len];
        filter.process(&in_band, &mut out_in);

        filter.reset();
        let out_of_band = tone(2000.0, fs, len);
        let mut out_out = vec![0.0; len];
        filter.process(&out_of_band, &mut out_out);

        // skip the transient
        let settled = len / 2;
        let gain_in = rms(&out_in[settled..]) / rms(&in_band[settled..]);
        let gain_out = rms(&out_out[settled..]) / rms(&out_of_band[settled..]);
        assert!(gain_in > 0.5, "70 Hz should pass, gain {}", gain_in);
        assert!(gain_out < 0.01, "2 kHz should be rejected, gain {}", gain_out);
    }
}
