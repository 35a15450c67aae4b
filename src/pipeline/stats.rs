//! Lock-free pipeline counters
//!
//! Workers bump relaxed atomics; readers take a [`PipelineStats`] snapshot.
//! Counters are independent, so a snapshot taken mid-run may be a few events
//! out of step between fields.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::analysis::result::PipelineStats;
use crate::features::peaks::PeakLabel;

/// Counter selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Blocks written to the ring store
    BlocksIngested,
    /// Blocks dropped before reaching the ring store
    BlocksDropped,
    /// Raw detector candidates
    PeaksDetected,
    /// Validated events lost to a full queue
    PeakEventsDropped,
    /// Windows delivered to analysis
    WindowsExtracted,
    /// Cycles dropped at extraction
    WindowsDropped,
    /// Windows analysed
    CyclesAnalysed,
    /// Analysed windows without S1
    MissedCycles,
    /// Records accepted by the sink
    RecordsSent,
    /// Records refused by the sink
    RecordsDropped,
}

/// Shared atomic counters
#[derive(Debug, Default)]
pub struct StatsCounters {
    blocks_ingested: AtomicU64,
    blocks_dropped: AtomicU64,
    peaks_detected: AtomicU64,
    peaks_s1: AtomicU64,
    peaks_s2: AtomicU64,
    peaks_unvalidated: AtomicU64,
    peak_events_dropped: AtomicU64,
    windows_extracted: AtomicU64,
    windows_dropped: AtomicU64,
    cycles_analysed: AtomicU64,
    missed_cycles: AtomicU64,
    records_sent: AtomicU64,
    records_dropped: AtomicU64,
}

impl StatsCounters {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::BlocksIngested => &self.blocks_ingested,
            Counter::BlocksDropped => &self.blocks_dropped,
            Counter::PeaksDetected => &self.peaks_detected,
            Counter::PeakEventsDropped => &self.peak_events_dropped,
            Counter::WindowsExtracted => &self.windows_extracted,
            Counter::WindowsDropped => &self.windows_dropped,
            Counter::CyclesAnalysed => &self.cycles_analysed,
            Counter::MissedCycles => &self.missed_cycles,
            Counter::RecordsSent => &self.records_sent,
            Counter::RecordsDropped => &self.records_dropped,
        }
    }

    /// Add `n` to a counter
    pub fn add(&self, counter: Counter, n: u64) {
        self.slot(counter).fetch_add(n, Ordering::Relaxed);
    }

    /// Add one to a counter
    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Count one validator output by label
    pub fn record_label(&self, label: PeakLabel) {
        let slot = match label {
            PeakLabel::S1 => &self.peaks_s1,
            PeakLabel::S2 => &self.peaks_s2,
            PeakLabel::Unvalidated => &self.peaks_unvalidated,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            blocks_ingested: self.blocks_ingested.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
            peaks_detected: self.peaks_detected.load(Ordering::Relaxed),
            peaks_s1: self.peaks_s1.load(Ordering::Relaxed),
            peaks_s2: self.peaks_s2.load(Ordering::Relaxed),
            peaks_unvalidated: self.peaks_unvalidated.load(Ordering::Relaxed),
            peak_events_dropped: self.peak_events_dropped.load(Ordering::Relaxed),
            windows_extracted: self.windows_extracted.load(Ordering::Relaxed),
            windows_dropped: self.windows_dropped.load(Ordering::Relaxed),
            cycles_analysed: self.cycles_analysed.load(Ordering::Relaxed),
            missed_cycles: self.missed_cycles.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let stats = StatsCounters::new();
        stats.incr(Counter::BlocksIngested);
        stats.add(Counter::PeaksDetected, 5);
        stats.record_label(PeakLabel::S1);
        stats.record_label(PeakLabel::S1);
        stats.record_label(PeakLabel::Unvalidated);

        let snap = stats.snapshot();
        assert_eq!(snap.blocks_ingested, 1);
        assert_eq!(snap.peaks_detected, 5);
        assert_eq!(snap.peaks_s1, 2);
        assert_eq!(snap.peaks_s2, 0);
        assert_eq!(snap.peaks_unvalidated, 1);
    }

    #[test]
    fn test_counters_across_threads() {
        let stats = Arc::new(StatsCounters::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.incr(Counter::RecordsSent);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().records_sent, 4000);
    }
}
