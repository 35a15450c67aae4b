//! End-to-end pipelines
//!
//! - [`Pipeline`]: single-threaded, block in / reports out, for offline runs
//!   and tests
//! - [`runtime::spawn`]: producer, ingest and analysis workers joined by
//!   bounded queues, for live streams
//!
//! Both drive the same stages: [`ingest::IngestStage`] →
//! [`PeakProcessor`] → [`cycle::CycleAnalyser`].

pub mod cycle;
pub mod ingest;
pub mod runtime;
pub mod stats;
pub mod transport;

use std::sync::Arc;

use crate::analysis::result::{CycleReport, PipelineStats, TrendAlerts};
use crate::analysis::trend::TrendBank;
use crate::analysis::PeakProcessor;
use crate::config::PipelineConfig;
use crate::error::DspError;
use crate::features::peaks::PeakEvent;
use crate::io::{BlockSource, RingWindowStore};

pub use cycle::CycleAnalyser;
pub use ingest::IngestStage;
pub use runtime::{spawn, PipelineHandle, RuntimeOutput};
pub use stats::{Counter, StatsCounters};
pub use transport::{ChannelSink, FeatureSink, NullSink, VecSink};

/// Feed one validated event to the processor, counting the outcome
pub(crate) fn dispatch_event<S, W>(
    processor: &mut PeakProcessor<CycleAnalyser<S>>,
    event: &PeakEvent,
    source: &W,
    stats: &StatsCounters,
) where
    S: FeatureSink,
    W: crate::io::WindowSource + ?Sized,
{
    match processor.process_peak(event, source) {
        Ok(true) => stats.incr(Counter::WindowsExtracted),
        Ok(false) => {}
        Err(e) => {
            log::debug!("Cycle ending at {} dropped: {}", event.global_index, e);
            stats.incr(Counter::WindowsDropped);
        }
    }
}

/// Synchronous pipeline over one ring store
#[derive(Debug)]
pub struct Pipeline<S> {
    config: PipelineConfig,
    ingest: IngestStage,
    store: RingWindowStore,
    processor: PeakProcessor<CycleAnalyser<S>>,
    stats: Arc<StatsCounters>,
    events: Vec<PeakEvent>,
}

impl<S: FeatureSink> Pipeline<S> {
    /// Validate `config` and build every stage
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidConfig` for a configuration that fails
    /// [`PipelineConfig::validate`].
    pub fn new(config: PipelineConfig, sink: S) -> Result<Self, DspError> {
        config.validate()?;
        let stats = Arc::new(StatsCounters::new());
        let cycles = CycleAnalyser::new(&config, sink, Arc::clone(&stats))?;
        Ok(Self {
            ingest: IngestStage::new(&config)?,
            store: RingWindowStore::new(config.ring.num_blocks, config.ring.block_size)?,
            processor: PeakProcessor::new(&config.processor, cycles),
            stats,
            events: Vec::new(),
            config,
        })
    }

    /// Retain every cycle report, see [`Self::take_reports`]
    pub fn keep_reports(mut self) -> Self {
        self.processor.consumer_mut().retain_reports();
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one PCM block
    ///
    /// Cycle-level failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidInput` for an empty or over-long block; the
    /// block is counted as dropped and the pipeline stays usable.
    pub fn push_block(&mut self, pcm: &[i16]) -> Result<(), DspError> {
        self.events.clear();
        let events = &mut self.events;
        let candidates = match self
            .ingest
            .process_block(pcm, &mut self.store, |e| events.push(e))
        {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Dropping audio block: {}", e);
                self.stats.incr(Counter::BlocksDropped);
                return Err(e);
            }
        };
        self.stats.incr(Counter::BlocksIngested);
        self.stats.add(Counter::PeaksDetected, candidates as u64);

        for event in &self.events {
            self.stats.record_label(event.label);
            dispatch_event(&mut self.processor, event, &self.store, &self.stats);
        }
        Ok(())
    }

    /// Pull blocks from `source` until it ends
    ///
    /// Malformed blocks are skipped.
    ///
    /// # Errors
    ///
    /// Propagates the first acquisition error.
    pub fn run<B: BlockSource + ?Sized>(&mut self, source: &mut B) -> Result<(), DspError> {
        while let Some(block) = source.next_block()? {
            if let Err(e) = self.push_block(&block.samples) {
                if !e.is_recoverable() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Counter snapshot
    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// Pull-based alert state
    pub fn alerts(&self) -> TrendAlerts {
        self.processor.consumer().alerts()
    }

    /// Trend analysers
    pub fn trends(&self) -> &TrendBank {
        self.processor.consumer().trends()
    }

    /// Most recent cycle report
    pub fn last_report(&self) -> Option<&CycleReport> {
        self.processor.consumer().last_report()
    }

    /// Retained cycle reports since the last call
    pub fn take_reports(&mut self) -> Vec<CycleReport> {
        self.processor.consumer_mut().take_reports()
    }

    /// Ring store, read-only
    pub fn store(&self) -> &RingWindowStore {
        &self.store
    }

    /// Feature sink
    pub fn sink(&self) -> &S {
        self.processor.consumer().sink()
    }

    /// Tear down, returning the sink and trend bank
    pub fn into_parts(self) -> (S, TrendBank) {
        self.processor.into_consumer().into_parts()
    }
}
