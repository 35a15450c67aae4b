//! Audio ingest stage
//!
//! Per acquisition block:
//! 1. PCM to `f32`, zero-padding a short final block
//! 2. Band-pass filter
//! 3. Write the filtered block into the ring store (write-then-advance)
//! 4. Envelope, then the streaming detector and validator, sample by sample
//!
//! Steps 1-2 and 4 touch only private state, so the threaded runtime holds the
//! ring store's write lock for the copy in step 3 alone.

use crate::config::PipelineConfig;
use crate::error::DspError;
use crate::features::peaks::{PeakDetector, PeakEvent, PeakValidator};
use crate::io::{pcm_to_f32, RingWindowStore};
use crate::preprocessing::{BiquadCascade, BlockFilter, EnvelopeFollower};

/// Filter, store and detect stage
#[derive(Debug)]
pub struct IngestStage<B = BiquadCascade, E = EnvelopeFollower> {
    block_size: usize,
    bandpass: B,
    envelope: E,
    detector: PeakDetector,
    validator: PeakValidator,
    pcm: Vec<f32>,
    filtered: Vec<f32>,
    env: Vec<f32>,
}

impl IngestStage {
    /// Build with the configured biquad band-pass and envelope low-pass
    pub fn new(config: &PipelineConfig) -> Result<Self, DspError> {
        let bandpass = BiquadCascade::new(&config.filters.bandpass)?;
        let envelope = EnvelopeFollower::new(&config.filters.envelope_lowpass)?;
        Self::with_filters(config, bandpass, envelope)
    }
}

impl<B: BlockFilter, E: BlockFilter> IngestStage<B, E> {
    /// Build with caller-supplied filter primitives
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidConfig` for a zero block size.
    pub fn with_filters(config: &PipelineConfig, bandpass: B, envelope: E) -> Result<Self, DspError> {
        let block_size = config.ring.block_size;
        if block_size == 0 {
            return Err(DspError::InvalidConfig("ring.block_size must be > 0".to_string()));
        }
        Ok(Self {
            block_size,
            bandpass,
            envelope,
            detector: PeakDetector::new(&config.detector),
            validator: PeakValidator::new(&config.validator),
            pcm: vec![0.0; block_size],
            filtered: vec![0.0; block_size],
            env: vec![0.0; block_size],
        })
    }

    /// Samples per block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Streaming detector state
    pub fn detector(&self) -> &PeakDetector {
        &self.detector
    }

    /// Clear filter, detector and validator state
    pub fn reset(&mut self) {
        self.bandpass.reset();
        self.envelope.reset();
        self.detector.reset();
        self.validator.reset();
    }

    /// Convert and band-pass one PCM block
    ///
    /// Blocks shorter than the block size are zero-padded.
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidInput` for an empty block or one longer than
    /// the block size.
    pub fn filter_block(&mut self, pcm: &[i16]) -> Result<&[f32], DspError> {
        if pcm.is_empty() || pcm.len() > self.block_size {
            return Err(DspError::InvalidInput(format!(
                "Audio block has {} samples, expected 1..={}",
                pcm.len(),
                self.block_size
            )));
        }
        if pcm.len() < self.block_size {
            log::debug!(
                "Padding short block of {} samples to {}",
                pcm.len(),
                self.block_size
            );
            self.pcm[pcm.len()..].fill(0.0);
        }
        pcm_to_f32(pcm, &mut self.pcm);
        self.bandpass.process(&self.pcm, &mut self.filtered);
        Ok(&self.filtered)
    }

    /// Run envelope, detector and validator over the last filtered block
    ///
    /// `block_start` is the absolute index of the block's first sample, i.e.
    /// the ring store's sample count before the block was written. Every
    /// validator output goes to `emit`, whatever its label.
    ///
    /// Returns the number of raw candidates.
    pub fn detect_peaks<F>(&mut self, block_start: i64, mut emit: F) -> usize
    where
        F: FnMut(PeakEvent),
    {
        self.envelope.process(&self.filtered, &mut self.env);

        let mut candidates = 0;
        for (i, &x) in self.env.iter().enumerate() {
            if let Some(candidate) = self.detector.update(x, block_start + i as i64) {
                candidates += 1;
                if let Some(validated) = self.validator.notify_peak(candidate) {
                    emit(validated);
                }
            }
        }
        candidates
    }

    /// Filter, store and detect in one call
    ///
    /// # Errors
    ///
    /// Same as [`Self::filter_block`]; the store is left untouched on error.
    pub fn process_block<F>(
        &mut self,
        pcm: &[i16],
        store: &mut RingWindowStore,
        emit: F,
    ) -> Result<usize, DspError>
    where
        F: FnMut(PeakEvent),
    {
        let block_start = store.absolute_sample_index() as i64;
        let filtered = self.filter_block(pcm)?;
        store.push_block(filtered)?;
        Ok(self.detect_peaks(block_start, emit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::peaks::PeakLabel;

    /// Pass-through filter for exercising the detection path in isolation
    struct Identity;

    impl BlockFilter for Identity {
        fn process(&mut self, input: &[f32], output: &mut [f32]) {
            output.copy_from_slice(input);
        }

        fn reset(&mut self) {}
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.ring.block_size = 100;
        config.ring.num_blocks = 50;
        config.detector.alpha = 0.01;
        config.detector.min_distance = 20;
        config
    }

    #[test]
    fn test_filter_block_pads_short_block() {
        let config = small_config();
        let mut ingest = IngestStage::with_filters(&config, Identity, Identity).unwrap();
        let filtered = ingest.filter_block(&[16384; 40]).unwrap();
        assert_eq!(filtered.len(), 100);
        assert_eq!(filtered[39], 0.5);
        assert_eq!(filtered[40], 0.0);
    }

    #[test]
    fn test_filter_block_rejects_bad_lengths() {
        let config = small_config();
        let mut ingest = IngestStage::with_filters(&config, Identity, Identity).unwrap();
        assert!(matches!(ingest.filter_block(&[]), Err(DspError::InvalidInput(_))));
        assert!(matches!(
            ingest.filter_block(&[0; 101]),
            Err(DspError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_process_block_writes_store_and_indexes_peaks() {
        let config = small_config();
        let mut ingest = IngestStage::with_filters(&config, Identity, Identity).unwrap();
        let mut store = RingWindowStore::new(config.ring.num_blocks, config.ring.block_size).unwrap();

        // pulses with short/long spacing, repeated: 30, 100 apart
        let mut pcm = vec![0i16; 2000];
        let mut t = 50;
        while t < 1950 {
            pcm[t] = 20000;
            let s2 = t + 30;
            if s2 < 2000 {
                pcm[s2] = 12000;
            }
            t += 130;
        }

        let mut events = Vec::new();
        let mut candidates = 0;
        for chunk in pcm.chunks(100) {
            candidates += ingest
                .process_block(chunk, &mut store, |e| events.push(e))
                .unwrap();
        }

        assert_eq!(store.absolute_sample_index(), 2000);
        assert!(candidates >= 20, "expected the pulse train, got {}", candidates);
        assert_eq!(events.len(), candidates - 2, "validator lags two peaks");
        assert!(events.iter().any(|e| e.label == PeakLabel::S1));
        assert!(events.iter().any(|e| e.label == PeakLabel::S2));
        for e in &events {
            assert!(
                pcm[e.global_index as usize] != 0,
                "event index {} must point at a pulse",
                e.global_index
            );
        }

        // the store holds what the filter produced
        let window = store.extract_window(50, 51, 0, 0).unwrap();
        assert!((window[0] - 20000.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_filters_build() {
        let config = PipelineConfig::default();
        let mut ingest = IngestStage::new(&config).unwrap();
        assert_eq!(ingest.block_size(), 1600);
        let filtered = ingest.filter_block(&vec![0i16; 1600]).unwrap();
        assert!(filtered.iter().all(|&x| x == 0.0));
    }
}
