//! Timing-ratio peak validator
//!
//! Keeps the last three envelope peaks and labels the middle one from the two
//! gaps around it. With `t1 = p1 - p0`, `t2 = p2 - p1` and `T = t1 + t2`:
//!
//! 1. `t1 < close_r*T` and `t2 > far_r*T`: short gap then long gap. `p1` is
//!    the second sound of a pair, so S2, unless `p0` was already S2, in which
//!    case `p1` starts the next cycle (S1)
//! 2. `t1 > close_r*T` and `t2 < far_r*T`: the S2 after `p1` was missed, S1
//! 3. both `t1/T` and `t2/T` strictly inside `0.5 ± margin`: evenly spaced
//!    S1 cadence, S1
//! 4. otherwise ambiguous, `Unvalidated`
//!
//! Labels are written into the history in place, so the alternation rule
//! sees the label `p0` received one step earlier.

use super::{PeakEvent, PeakLabel};
use crate::config::ValidatorConfig;

const PEAK_BUF_SIZE: usize = 3;

/// 3-peak sliding-window S1/S2 classifier
#[derive(Debug, Clone)]
pub struct PeakValidator {
    buffer: [PeakEvent; PEAK_BUF_SIZE],
    write_idx: usize,
    valid_count: usize,
    close_r: f32,
    far_r: f32,
    margin: f32,
}

impl PeakValidator {
    /// Create a validator with empty history
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            buffer: [PeakEvent::candidate(0.0, 0); PEAK_BUF_SIZE],
            write_idx: 0,
            valid_count: 0,
            close_r: config.close_r,
            far_r: config.far_r,
            margin: config.margin,
        }
    }

    /// Forget the peak history
    pub fn reset(&mut self) {
        self.buffer = [PeakEvent::candidate(0.0, 0); PEAK_BUF_SIZE];
        self.write_idx = 0;
        self.valid_count = 0;
    }

    /// Three peaks have been seen since creation or reset
    pub fn warmed_up(&self) -> bool {
        self.valid_count >= PEAK_BUF_SIZE
    }

    /// Push a raw candidate and classify the previous one
    ///
    /// Returns `None` until three peaks have been seen; afterwards returns
    /// the newly labeled middle peak (any label, including `Unvalidated`).
    pub fn notify_peak(&mut self, candidate: PeakEvent) -> Option<PeakEvent> {
        self.buffer[self.write_idx] = PeakEvent {
            label: PeakLabel::Unvalidated,
            ..candidate
        };
        self.write_idx = (self.write_idx + 1) % PEAK_BUF_SIZE;

        if self.valid_count < PEAK_BUF_SIZE {
            self.valid_count += 1;
        }
        if self.valid_count < PEAK_BUF_SIZE {
            return None;
        }

        let idx0 = self.write_idx; // oldest
        let idx1 = (self.write_idx + 1) % PEAK_BUF_SIZE;
        let idx2 = (self.write_idx + 2) % PEAK_BUF_SIZE;

        let p0 = self.buffer[idx0];
        let p1 = self.buffer[idx1];
        let p2 = self.buffer[idx2];

        let label = self.classify(&p0, &p1, &p2);
        self.buffer[idx1].label = label;

        log::debug!(
            "Validated peak at {} as {:?} (value={:.5})",
            p1.global_index,
            label,
            p1.value
        );

        Some(self.buffer[idx1])
    }

    fn classify(&self, p0: &PeakEvent, p1: &PeakEvent, p2: &PeakEvent) -> PeakLabel {
        let t1 = (p1.global_index - p0.global_index) as f32;
        let t2 = (p2.global_index - p1.global_index) as f32;
        let total = t1 + t2;
        if total <= 0.0 {
            return PeakLabel::Unvalidated;
        }

        let close_thresh = self.close_r * total;
        let far_thresh = self.far_r * total;
        let r1 = t1 / total;
        let r2 = t2 / total;
        let lower = 0.5 - self.margin;
        let upper = 0.5 + self.margin;

        if t1 < close_thresh && t2 > far_thresh {
            if p0.label == PeakLabel::S2 {
                PeakLabel::S1
            } else {
                PeakLabel::S2
            }
        } else if t1 > close_thresh && t2 < far_thresh {
            PeakLabel::S1
        } else if r1 > lower && r1 < upper && r2 > lower && r2 < upper {
            PeakLabel::S1
        } else {
            PeakLabel::Unvalidated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PeakValidator {
        PeakValidator::new(&ValidatorConfig::default())
    }

    fn feed(v: &mut PeakValidator, indices: &[i64]) -> Vec<PeakEvent> {
        indices
            .iter()
            .filter_map(|&i| v.notify_peak(PeakEvent::candidate(1.0, i)))
            .collect()
    }

    #[test]
    fn test_warm_up_needs_three_peaks() {
        let mut v = validator();
        assert!(v.notify_peak(PeakEvent::candidate(1.0, 0)).is_none());
        assert!(v.notify_peak(PeakEvent::candidate(1.0, 100)).is_none());
        assert!(!v.warmed_up());
        assert!(v.notify_peak(PeakEvent::candidate(1.0, 200)).is_some());
        assert!(v.warmed_up());

        v.reset();
        assert!(!v.warmed_up());
        assert!(v.notify_peak(PeakEvent::candidate(1.0, 300)).is_none());
    }

    #[test]
    fn test_alternation_short_long_pattern() {
        // S1 at 1000k, S2 300 samples later, next S1 700 samples after that
        let mut indices = Vec::new();
        for cycle in 0..6 {
            indices.push(cycle * 1000);
            indices.push(cycle * 1000 + 300);
        }
        let mut v = validator();
        let labeled = feed(&mut v, &indices);

        assert_eq!(labeled.len(), indices.len() - 2);
        for event in &labeled {
            let expected = if event.global_index % 1000 == 300 {
                PeakLabel::S2
            } else {
                PeakLabel::S1
            };
            assert_eq!(
                event.label, expected,
                "peak at {} mislabeled",
                event.global_index
            );
        }
    }

    #[test]
    fn test_alternation_avoids_double_s2() {
        let mut v = validator();
        // (0, 100, 400): short then long -> 100 is S2
        // (100, 400, 2000): short then long again, but p0 is already S2 -> 400 is S1
        let labeled = feed(&mut v, &[0, 100, 400, 2000]);
        assert_eq!(labeled[0].global_index, 100);
        assert_eq!(labeled[0].label, PeakLabel::S2);
        assert_eq!(labeled[1].global_index, 400);
        assert_eq!(labeled[1].label, PeakLabel::S1);
    }

    #[test]
    fn test_missed_s2_is_s1() {
        let mut v = validator();
        // long gap then short gap
        let labeled = feed(&mut v, &[0, 700, 1000]);
        assert_eq!(labeled[0].label, PeakLabel::S1);
    }

    #[test]
    fn test_equal_spacing_labels_s1() {
        let mut v = validator();
        let labeled = feed(&mut v, &[0, 800, 1600]);
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].global_index, 800);
        assert_eq!(labeled[0].label, PeakLabel::S1);
    }

    #[test]
    fn test_equal_spacing_band_rule() {
        // ratios exactly at close_r/far_r boundaries fall through to the band rule
        let config = ValidatorConfig {
            close_r: 0.5,
            far_r: 0.5,
            margin: 0.05,
        };
        let mut v = PeakValidator::new(&config);
        let labeled = feed(&mut v, &[0, 500, 1000]);
        assert_eq!(labeled[0].label, PeakLabel::S1);
    }

    #[test]
    fn test_ambiguous_is_unvalidated() {
        // with close_r = far_r = 0.3 a 0.6 / 0.4 split matches no rule
        let config = ValidatorConfig {
            close_r: 0.3,
            far_r: 0.3,
            margin: 0.05,
        };
        let mut v = PeakValidator::new(&config);
        let labeled = feed(&mut v, &[0, 600, 1000]);
        assert_eq!(labeled[0].label, PeakLabel::Unvalidated);
    }

    #[test]
    fn test_duplicate_indices_are_unvalidated() {
        let mut v = validator();
        let labeled = feed(&mut v, &[100, 100, 100]);
        assert_eq!(labeled[0].label, PeakLabel::Unvalidated);
    }
}
