//! Acquisition boundary: PCM blocks and the sources that produce them
//!
//! The acquisition collaborator (microphone driver, file replay) is outside
//! the DSP core. It only has to deliver [`AudioBlock`]s through a
//! [`BlockSource`]; the ingest side converts them to `f32` and filters them.

use std::time::Duration;

use crate::error::DspError;

/// Full-scale divisor for 16-bit PCM
const PCM_FULL_SCALE: f32 = 32768.0;

/// One block of raw 16-bit mono PCM
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    /// PCM samples
    pub samples: Vec<i16>,
}

impl AudioBlock {
    /// Wrap PCM samples
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Size of the payload in bytes
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the block carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Message on the audio ingest queue
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionMessage {
    /// A filled PCM block
    Data(AudioBlock),
    /// Acquisition finished; the consumer drains and exits
    Stop,
}

/// Convert PCM into normalised `f32`, writing into `out`
///
/// `out` must be at least as long as `pcm`; extra samples are left untouched.
pub fn pcm_to_f32(pcm: &[i16], out: &mut [f32]) {
    for (dst, &src) in out.iter_mut().zip(pcm) {
        *dst = src as f32 / PCM_FULL_SCALE;
    }
}

/// Producer of PCM blocks
///
/// `Ok(None)` marks the end of the stream. An `Err` is a fatal capture
/// error (device not ready, read timeout) and stops the producer.
pub trait BlockSource {
    /// Next block, blocking until one is available
    fn next_block(&mut self) -> Result<Option<AudioBlock>, DspError>;
}

impl<F> BlockSource for F
where
    F: FnMut() -> Result<Option<AudioBlock>, DspError>,
{
    fn next_block(&mut self) -> Result<Option<AudioBlock>, DspError> {
        self()
    }
}

/// Replays an in-memory recording block by block
///
/// The trailing partial block is delivered short; the ingest stage pads it.
/// With pacing enabled each block is released after its own duration, the
/// way a file replay feeds the pipeline at microphone speed.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    pcm: Vec<i16>,
    block_size: usize,
    position: usize,
    pacing: Option<Duration>,
}

impl ReplaySource {
    /// Replay `pcm` in blocks of `block_size` samples as fast as possible
    pub fn new(pcm: Vec<i16>, block_size: usize) -> Self {
        Self {
            pcm,
            block_size: block_size.max(1),
            position: 0,
            pacing: None,
        }
    }

    /// Sleep one block duration before each block
    pub fn paced(mut self, sample_rate: u32) -> Self {
        if sample_rate > 0 {
            let micros = self.block_size as u64 * 1_000_000 / sample_rate as u64;
            self.pacing = Some(Duration::from_micros(micros));
        }
        self
    }

    /// Blocks left to deliver, counting a trailing partial block
    pub fn remaining_blocks(&self) -> usize {
        let left = self.pcm.len() - self.position;
        left.div_ceil(self.block_size)
    }
}

impl BlockSource for ReplaySource {
    fn next_block(&mut self) -> Result<Option<AudioBlock>, DspError> {
        if self.position >= self.pcm.len() {
            return Ok(None);
        }
        if let Some(delay) = self.pacing {
            std::thread::sleep(delay);
        }
        let end = (self.position + self.block_size).min(self.pcm.len());
        let block = AudioBlock::new(self.pcm[self.position..end].to_vec());
        self.position = end;
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion_scale() {
        let pcm = [0i16, 16384, -32768, 32767];
        let mut out = [0.0f32; 4];
        pcm_to_f32(&pcm, &mut out);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert_eq!(out[2], -1.0);
        assert!(out[3] < 1.0 && out[3] > 0.999);
    }

    #[test]
    fn test_block_size_bytes() {
        let block = AudioBlock::new(vec![0; 1600]);
        assert_eq!(block.size_bytes(), 3200);
        assert_eq!(block.len(), 1600);
    }

    #[test]
    fn test_replay_delivers_all_samples() {
        let pcm: Vec<i16> = (0..25).collect();
        let mut source = ReplaySource::new(pcm, 10);
        assert_eq!(source.remaining_blocks(), 3);

        let mut lengths = Vec::new();
        while let Some(block) = source.next_block().unwrap() {
            lengths.push(block.len());
        }
        assert_eq!(lengths, vec![10, 10, 5]);
        assert!(source.next_block().unwrap().is_none());
    }

    #[test]
    fn test_closure_source() {
        let mut count = 0;
        let mut source = move || {
            count += 1;
            if count > 2 {
                Ok(None)
            } else {
                Ok(Some(AudioBlock::new(vec![1; 4])))
            }
        };
        assert!(source.next_block().unwrap().is_some());
        assert!(source.next_block().unwrap().is_some());
        assert!(source.next_block().unwrap().is_none());
    }
}
