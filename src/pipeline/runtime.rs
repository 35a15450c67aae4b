//! Threaded streaming runtime
//!
//! Three workers connected by bounded queues:
//!
//! ```text
//! producer ──AcquisitionMessage──▶ ingest ──PeakEvent──▶ analysis
//!  (source)      audio queue       (filter, store,   peak queue   (processor,
//!                                   detect, validate)              window analysis,
//!                                                                  trends, sink)
//! ```
//!
//! The ring store is shared as `Arc<RwLock<_>>`. Ingest is its only writer
//! and holds the write lock for one block copy; analysis copies each window
//! out under a read lock and analyses the copy after releasing it.
//!
//! Backpressure never stalls the producer indefinitely: audio blocks are sent
//! with a timeout and dropped on expiry, peak events are dropped as soon as
//! their queue is full. Both drops are logged and counted.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};

use super::cycle::CycleAnalyser;
use super::ingest::IngestStage;
use super::stats::{Counter, StatsCounters};
use super::transport::FeatureSink;
use super::dispatch_event;
use crate::analysis::result::{PipelineStats, TrendAlerts};
use crate::analysis::trend::TrendBank;
use crate::analysis::PeakProcessor;
use crate::config::PipelineConfig;
use crate::error::DspError;
use crate::features::peaks::PeakEvent;
use crate::io::{AcquisitionMessage, BlockSource, RingWindowStore};

/// What a finished runtime hands back
#[derive(Debug)]
pub struct RuntimeOutput<S> {
    /// Final counters
    pub stats: PipelineStats,
    /// Final alert state
    pub alerts: TrendAlerts,
    /// The feature sink, with whatever it collected
    pub sink: S,
    /// Trend analysers at shutdown
    pub trends: TrendBank,
    /// Fatal acquisition error that ended the stream, if any
    pub acquisition_error: Option<DspError>,
}

/// Control and status handle for a running pipeline
#[derive(Debug)]
pub struct PipelineHandle<S> {
    stop: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    alert_code: Arc<AtomicU8>,
    producer: JoinHandle<Result<(), DspError>>,
    ingest: JoinHandle<()>,
    analysis: JoinHandle<(S, TrendBank)>,
}

impl<S> PipelineHandle<S> {
    /// Counter snapshot
    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// Alert state after the most recent analysed cycle
    pub fn alerts(&self) -> TrendAlerts {
        TrendAlerts::from_code(self.alert_code.load(Ordering::Acquire))
    }

    /// Ask the producer to stop after its current block
    ///
    /// The queues drain before the workers exit. A source blocked inside
    /// `next_block` is only noticed once it returns.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// All workers have exited
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished() && self.ingest.is_finished() && self.analysis.is_finished()
    }

    /// Wait for every worker and collect the results
    ///
    /// # Errors
    ///
    /// Returns `DspError::WorkerPanicked` if any worker panicked. An
    /// acquisition error is not an `Err` here; it is reported in
    /// [`RuntimeOutput::acquisition_error`] next to everything analysed
    /// before it.
    pub fn join(self) -> Result<RuntimeOutput<S>, DspError> {
        let acquisition_error = self
            .producer
            .join()
            .map_err(|_| DspError::WorkerPanicked("producer"))?
            .err();
        self.ingest
            .join()
            .map_err(|_| DspError::WorkerPanicked("ingest"))?;
        let (sink, trends) = self
            .analysis
            .join()
            .map_err(|_| DspError::WorkerPanicked("analysis"))?;

        Ok(RuntimeOutput {
            stats: self.stats.snapshot(),
            alerts: trends.alerts(),
            sink,
            trends,
            acquisition_error,
        })
    }
}

/// Start producer, ingest and analysis workers
///
/// Stages are built on the calling thread, so configuration problems surface
/// here rather than inside a worker.
///
/// # Errors
///
/// Returns `DspError::InvalidConfig` for a rejected configuration and
/// `DspError::Acquisition` if a worker thread cannot be started.
pub fn spawn<B, S>(config: PipelineConfig, source: B, sink: S) -> Result<PipelineHandle<S>, DspError>
where
    B: BlockSource + Send + 'static,
    S: FeatureSink + Send + 'static,
{
    config.validate()?;

    let stats = Arc::new(StatsCounters::new());
    let stop = Arc::new(AtomicBool::new(false));
    let alert_code = Arc::new(AtomicU8::new(0));
    let store = Arc::new(RwLock::new(RingWindowStore::new(
        config.ring.num_blocks,
        config.ring.block_size,
    )?));

    let ingest_stage = IngestStage::new(&config)?;
    let cycles = CycleAnalyser::new(&config, sink, Arc::clone(&stats))?;
    let processor = PeakProcessor::new(&config.processor, cycles);

    let (audio_tx, audio_rx) = bounded::<AcquisitionMessage>(config.queues.audio_capacity);
    let (peak_tx, peak_rx) = bounded::<PeakEvent>(config.queues.peak_capacity);
    let send_timeout = Duration::from_millis(config.queues.send_timeout_ms);

    log::info!(
        "Starting pipeline ({:?} input): {} Hz, {} x {} sample ring, queues {}/{}",
        config.input,
        config.sample_rate,
        config.ring.num_blocks,
        config.ring.block_size,
        config.queues.audio_capacity,
        config.queues.peak_capacity
    );

    let analysis = {
        let store = Arc::clone(&store);
        let stats = Arc::clone(&stats);
        let alert_code = Arc::clone(&alert_code);
        spawn_worker("pcg-analysis", move || {
            analysis_worker(processor, peak_rx, &store, &stats, &alert_code)
        })?
    };

    let ingest = {
        let store = Arc::clone(&store);
        let stats = Arc::clone(&stats);
        spawn_worker("pcg-ingest", move || {
            ingest_worker(ingest_stage, audio_rx, peak_tx, &store, &stats)
        })?
    };

    let producer = {
        let stats = Arc::clone(&stats);
        let stop = Arc::clone(&stop);
        spawn_worker("pcg-producer", move || {
            producer_worker(source, audio_tx, send_timeout, &stop, &stats)
        })?
    };

    Ok(PipelineHandle {
        stop,
        stats,
        alert_code,
        producer,
        ingest,
        analysis,
    })
}

fn spawn_worker<T, F>(name: &str, f: F) -> Result<JoinHandle<T>, DspError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| DspError::Acquisition(format!("cannot start {} worker: {}", name, e)))
}

fn producer_worker<B: BlockSource>(
    mut source: B,
    audio_tx: Sender<AcquisitionMessage>,
    send_timeout: Duration,
    stop: &AtomicBool,
    stats: &StatsCounters,
) -> Result<(), DspError> {
    let result = loop {
        if stop.load(Ordering::Acquire) {
            log::info!("Producer stopping on request");
            break Ok(());
        }
        match source.next_block() {
            Ok(Some(block)) => {
                match audio_tx.send_timeout(AcquisitionMessage::Data(block), send_timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => {
                        let err = DspError::QueueFull("audio");
                        log::warn!("{} for {:?}, dropping block", err, send_timeout);
                        stats.incr(Counter::BlocksDropped);
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        log::warn!("Ingest worker gone, producer exiting");
                        return Ok(());
                    }
                }
            }
            Ok(None) => {
                log::info!("Acquisition finished");
                break Ok(());
            }
            Err(e) => {
                log::error!("Acquisition failed: {}", e);
                break Err(e);
            }
        }
    };

    // Stop must not be lost, so this send waits for room
    if audio_tx.send(AcquisitionMessage::Stop).is_err() {
        log::debug!("Ingest worker already gone at stop");
    }
    result
}

fn ingest_worker(
    mut ingest: IngestStage,
    audio_rx: Receiver<AcquisitionMessage>,
    peak_tx: Sender<PeakEvent>,
    store: &RwLock<RingWindowStore>,
    stats: &StatsCounters,
) {
    for message in audio_rx.iter() {
        let block = match message {
            AcquisitionMessage::Data(block) => block,
            AcquisitionMessage::Stop => break,
        };

        let filtered = match ingest.filter_block(&block.samples) {
            Ok(filtered) => filtered,
            Err(e) => {
                log::warn!("Dropping audio block: {}", e);
                stats.incr(Counter::BlocksDropped);
                continue;
            }
        };

        let block_start = {
            let mut guard = store.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            let start = guard.absolute_sample_index() as i64;
            if let Err(e) = guard.push_block(filtered) {
                log::warn!("Ring store rejected block: {}", e);
                stats.incr(Counter::BlocksDropped);
                continue;
            }
            start
        };
        stats.incr(Counter::BlocksIngested);

        let candidates = ingest.detect_peaks(block_start, |event| {
            stats.record_label(event.label);
            match peak_tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    let err = DspError::QueueFull("peak");
                    log::warn!("{}, dropping {:?} at {}", err, event.label, event.global_index);
                    stats.incr(Counter::PeakEventsDropped);
                }
                Err(TrySendError::Disconnected(_)) => {
                    stats.incr(Counter::PeakEventsDropped);
                }
            }
        });
        stats.add(Counter::PeaksDetected, candidates as u64);
    }
    log::info!("Ingest worker exiting");
    // dropping peak_tx lets analysis drain and exit
}

fn analysis_worker<S: FeatureSink>(
    mut processor: PeakProcessor<CycleAnalyser<S>>,
    peak_rx: Receiver<PeakEvent>,
    store: &RwLock<RingWindowStore>,
    stats: &StatsCounters,
    alert_code: &AtomicU8,
) -> (S, TrendBank) {
    for event in peak_rx.iter() {
        dispatch_event(&mut processor, &event, store, stats);
        alert_code.store(processor.consumer().alerts().code(), Ordering::Release);
    }
    log::info!("Analysis worker exiting");
    processor.into_consumer().into_parts()
}
