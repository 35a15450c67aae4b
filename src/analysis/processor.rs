//! Per-S1 cardiac window extraction
//!
//! Every validated S1 closes the cycle that started at the previous S1. The
//! window handed on is `[prev - pre, curr - pre)`: one full period, shifted
//! back by `pre` samples so the opening S1 sits inside the window with some
//! lead-in rather than on its first sample.
//!
//! `pre = clamp(pre_ratio * period, pre_min, pre_max)`, with `pre_max <= 0`
//! meaning no upper bound.

use crate::config::ProcessorConfig;
use crate::error::DspError;
use crate::features::peaks::PeakEvent;
use crate::io::WindowSource;

/// Receiver of extracted cardiac windows
pub trait WindowConsumer {
    /// Handle one window whose first sample has absolute index `window_start_index`
    fn consume(&mut self, window: &[f32], window_start_index: i64);
}

impl<F> WindowConsumer for F
where
    F: FnMut(&[f32], i64),
{
    fn consume(&mut self, window: &[f32], window_start_index: i64) {
        self(window, window_start_index)
    }
}

/// Lead-in padding for a cycle of `period` samples
pub fn compute_pre_samples(period: i64, pre_ratio: f32, pre_min: i64, pre_max: i64) -> i64 {
    let mut pre = (pre_ratio as f64 * period as f64) as i64;
    if pre < pre_min {
        pre = pre_min;
    }
    if pre_max > 0 && pre > pre_max {
        pre = pre_max;
    }
    pre
}

/// Turns consecutive S1 events into cardiac windows
#[derive(Debug)]
pub struct PeakProcessor<C> {
    config: ProcessorConfig,
    previous_s1: Option<PeakEvent>,
    window: Vec<f32>,
    consumer: C,
}

impl<C: WindowConsumer> PeakProcessor<C> {
    /// Create a processor delivering windows to `consumer`
    pub fn new(config: &ProcessorConfig, consumer: C) -> Self {
        Self {
            config: config.clone(),
            previous_s1: None,
            window: Vec::with_capacity(config.max_window_len),
            consumer,
        }
    }

    /// Last S1 seen, the start of the cycle currently open
    pub fn previous_s1(&self) -> Option<&PeakEvent> {
        self.previous_s1.as_ref()
    }

    /// Window consumer
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// Mutable window consumer
    pub fn consumer_mut(&mut self) -> &mut C {
        &mut self.consumer
    }

    /// Give back the consumer
    pub fn into_consumer(self) -> C {
        self.consumer
    }

    /// Forget the open cycle
    pub fn reset(&mut self) {
        self.previous_s1 = None;
    }

    /// Feed one validated peak event
    ///
    /// Only S1 events do anything. The current S1 always becomes the new
    /// cycle start, whether or not its window could be extracted.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when a window was delivered to the consumer, `Ok(false)` for
    /// ignored events and the very first S1.
    ///
    /// # Errors
    ///
    /// The cycle is dropped with:
    /// - `InvalidRange` for a non-increasing S1 index or a window reaching
    ///   before the stream start
    /// - `WindowTooLong` when the period exceeds `max_window_len`
    /// - `CapacityExceeded` when the window has aged out of the store
    pub fn process_peak<S>(&mut self, event: &PeakEvent, source: &S) -> Result<bool, DspError>
    where
        S: WindowSource + ?Sized,
    {
        if !event.is_s1() {
            return Ok(false);
        }

        let previous = self.previous_s1.replace(*event);
        let prev = match previous {
            Some(prev) => prev,
            None => return Ok(false),
        };

        let prev_idx = prev.global_index;
        let curr_idx = event.global_index;
        if curr_idx <= prev_idx {
            log::warn!(
                "S1 at {} does not follow previous S1 at {}, skipping cycle",
                curr_idx,
                prev_idx
            );
            return Err(DspError::InvalidRange {
                start: prev_idx,
                end: curr_idx,
            });
        }

        let period = curr_idx - prev_idx;
        let pre = compute_pre_samples(
            period,
            self.config.pre_ratio,
            self.config.pre_min,
            self.config.pre_max,
        );
        let window_start = prev_idx - pre;
        let window_len = period as usize;

        if window_len > self.config.max_window_len {
            log::warn!(
                "Cardiac period {} exceeds max window {}",
                window_len,
                self.config.max_window_len
            );
            return Err(DspError::WindowTooLong {
                len: window_len,
                max: self.config.max_window_len,
            });
        }

        if let Err(e) = source.copy_window(prev_idx, curr_idx, pre, -pre, &mut self.window) {
            log::warn!("Window extraction [{}, {}) failed: {}", prev_idx, curr_idx, e);
            return Err(e);
        }

        log::debug!(
            "Extracted cycle window start={} len={} (period={}, pre={})",
            window_start,
            self.window.len(),
            period,
            pre
        );
        self.consumer.consume(&self.window, window_start);
        Ok(true)
    }
}
