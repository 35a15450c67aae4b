//! Real-time envelope peak detector
//!
//! O(1) per sample. Keeps the last three envelope samples, an exponential
//! running mean and a refractory counter. A sample is reported one step late,
//! once its right-hand neighbour is known.
//!
//! Algorithm, for every new sample `x`:
//! 1. `mean += alpha * (x - mean)`; `threshold = threshold_scale * mean`
//! 2. Take `prev, mid, next` in time order, `mid` being one sample behind `x`
//! 3. Fire if `mid > threshold`, `mid >= prev`, `mid >= next`,
//!    `mid` is strictly above at least one neighbour, and at least
//!    `min_distance` samples passed since the last peak
//!
//! The "greater or equal to both, strictly greater than one" rule accepts the
//! edge of a plateau once but never reports a flat run as repeated peaks.

use super::PeakEvent;
use crate::config::DetectorConfig;

/// Streaming 3-tap peak detector with adaptive threshold
#[derive(Debug, Clone)]
pub struct PeakDetector {
    samples: [f32; 3],
    index: usize,
    running_mean: f32,
    alpha: f32,
    threshold_scale: f32,
    min_distance: u32,
    samples_since_peak: u32,
}

impl PeakDetector {
    /// Create a detector with an empty history
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            samples: [0.0; 3],
            index: 0,
            running_mean: 0.0,
            alpha: config.alpha,
            threshold_scale: config.threshold_scale,
            min_distance: config.min_distance,
            // lets the very first peak fire immediately
            samples_since_peak: u32::MAX,
        }
    }

    /// Clear history, mean and refractory state
    pub fn reset(&mut self) {
        self.samples = [0.0; 3];
        self.index = 0;
        self.running_mean = 0.0;
        self.samples_since_peak = u32::MAX;
    }

    /// Current running mean of the envelope
    pub fn running_mean(&self) -> f32 {
        self.running_mean
    }

    /// Current detection threshold
    pub fn threshold(&self) -> f32 {
        self.threshold_scale * self.running_mean
    }

    /// Feed one envelope sample with its absolute index
    ///
    /// Returns a candidate located at `global_index - 1` when the previous
    /// sample turns out to be a peak.
    pub fn update(&mut self, x: f32, global_index: i64) -> Option<PeakEvent> {
        self.running_mean += self.alpha * (x - self.running_mean);
        let threshold = self.threshold_scale * self.running_mean;
        self.samples[self.index] = x;

        let prev = self.samples[(self.index + 1) % 3];
        let mid = self.samples[(self.index + 2) % 3];
        let next = self.samples[self.index];

        let is_peak = mid > threshold
            && mid >= prev
            && mid >= next
            && (mid > prev || mid > next)
            && self.samples_since_peak >= self.min_distance;

        if is_peak {
            self.samples_since_peak = 0;
        } else {
            self.samples_since_peak = self.samples_since_peak.saturating_add(1);
        }

        self.index = (self.index + 1) % 3;

        if is_peak {
            Some(PeakEvent::candidate(mid, global_index - 1))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn config(min_distance: u32) -> DetectorConfig {
        DetectorConfig {
            alpha: 0.01,
            threshold_scale: 2.0,
            min_distance,
        }
    }

    fn run(detector: &mut PeakDetector, signal: &[f32]) -> Vec<PeakEvent> {
        signal
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| detector.update(x, i as i64))
            .collect()
    }

    #[test]
    fn test_single_isolated_pulse() {
        let mut signal = vec![0.0f32; 100];
        signal[40] = 0.5;
        signal[41] = 1.0;
        signal[42] = 0.5;

        let mut detector = PeakDetector::new(&config(10));
        let peaks = run(&mut detector, &signal);

        assert_eq!(peaks.len(), 1, "expected exactly one peak, got {:?}", peaks);
        assert_eq!(peaks[0].global_index, 41);
        assert_eq!(peaks[0].value, 1.0);
    }

    #[test]
    fn test_plateau_reported_once() {
        let mut signal = vec![0.0f32; 60];
        for s in signal.iter_mut().skip(20).take(5) {
            *s = 1.0;
        }
        let mut detector = PeakDetector::new(&config(0));
        let peaks = run(&mut detector, &signal);
        // rising edge (1 > 0 on the left) and falling edge (1 > 0 on the right)
        // are the only samples strictly above a neighbour
        assert!(peaks.len() <= 2, "flat run must not repeat, got {:?}", peaks);
        assert!(peaks.iter().all(|p| (20..25).contains(&p.global_index)));
    }

    #[test]
    fn test_flat_signal_fires_only_at_onset() {
        // the step up from the zeroed history is an edge; the flat run after it is not
        let signal = vec![0.3f32; 500];
        let mut detector = PeakDetector::new(&config(0));
        let peaks = run(&mut detector, &signal);
        assert_eq!(peaks.len(), 1, "got {:?}", peaks);
        assert_eq!(peaks[0].global_index, 0);
    }

    #[test]
    fn test_min_distance_respected() {
        // 40 Hz rectified sine at 1 kHz: a maximum every 12.5 samples
        let signal: Vec<f32> = (0..4000)
            .map(|i| (2.0 * PI * 40.0 * i as f32 / 1000.0).sin().abs())
            .collect();
        let min_distance = 50;
        let mut detector = PeakDetector::new(&DetectorConfig {
            threshold_scale: 1.2,
            ..config(min_distance)
        });
        let peaks = run(&mut detector, &signal);

        assert!(peaks.len() > 10, "expected a train of peaks, got {}", peaks.len());
        for pair in peaks.windows(2) {
            let gap = pair[1].global_index - pair[0].global_index;
            assert!(
                gap >= min_distance as i64,
                "peaks {} and {} closer than {}",
                pair[0].global_index,
                pair[1].global_index,
                min_distance
            );
        }
    }

    #[test]
    fn test_threshold_follows_mean() {
        let mut detector = PeakDetector::new(&config(0));
        for i in 0..1000 {
            detector.update(1.0, i);
        }
        assert!((detector.running_mean() - 1.0).abs() < 1e-3);
        assert!((detector.threshold() - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut detector = PeakDetector::new(&config(0));
        for i in 0..100 {
            detector.update(1.0, i);
        }
        detector.reset();
        assert_eq!(detector.running_mean(), 0.0);
    }
}
