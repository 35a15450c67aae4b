//! Amplitude envelope extraction
//!
//! Full-wave rectification followed by a low-pass cascade. The result is a
//! slowly varying curve whose local maxima mark heart-sound bursts, which is
//! what the streaming peak detector consumes.

use super::filter::{BiquadCascade, BlockFilter};
use crate::error::DspError;

/// Rectify-and-smooth envelope follower
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    lowpass: BiquadCascade,
    rectified: Vec<f32>,
}

impl EnvelopeFollower {
    /// Build from CMSIS-layout low-pass coefficients
    pub fn new(lowpass_stages: &[[f32; 5]]) -> Result<Self, DspError> {
        Ok(Self {
            lowpass: BiquadCascade::new(lowpass_stages)?,
            rectified: Vec::new(),
        })
    }
}

impl BlockFilter for EnvelopeFollower {
    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        self.rectified.clear();
        self.rectified.extend(input.iter().map(|x| x.abs()));
        self.lowpass.process(&self.rectified, output);
    }

    fn reset(&mut self) {
        self.lowpass.reset();
    }
}
