//! # Phono DSP
//!
//! Real-time phonocardiogram (heart-sound) processing core: detects S1 and S2
//! in a 16 kHz microphone stream, extracts per-cycle acoustic features, and
//! tracks their trends over recent cycles.
//!
//! ## Features
//!
//! - **Peak detection**: streaming envelope detector with adaptive threshold
//!   and S1/S2 validation from inter-peak spacing
//! - **Cardiac windows**: S1-to-S1 extraction from a ring store of recent
//!   filtered audio
//! - **Window analysis**: short-time energy peaks, positional S1/S2 labeling,
//!   RMS and spectral centroid per heart sound
//! - **Trends**: least-squares slope over the last cycles with alert flags
//!
//! ## Quick Start
//!
//! ```no_run
//! use phono_dsp::{analyze_recording, PipelineConfig};
//!
//! // 16-bit mono PCM at 16 kHz
//! let pcm: Vec<i16> = vec![];
//! let summary = analyze_recording(&pcm, PipelineConfig::default())?;
//!
//! for cycle in summary.analysed_cycles() {
//!     if let Some(s1) = &cycle.s1 {
//!         println!("{} ms: rms {:.3} centroid {:.1} Hz", cycle.timestamp_ms, s1.rms, s1.centroid);
//!     }
//! }
//! # Ok::<(), phono_dsp::DspError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PCM block → band-pass → ring store
//!                    └──→ envelope → peak detector → validator
//!                                                       │ S1
//!                       ring store ← window extraction ←┘
//!                            └──→ window analysis → trends → feature sink
//! ```
//!
//! [`Pipeline`] runs these stages on the calling thread; [`pipeline::spawn`]
//! runs them on producer, ingest and analysis workers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod pipeline;
pub mod preprocessing;

// Re-export main types
pub use analysis::result::{
    CycleReport, FeatureRecord, HeartSoundFeatures, PipelineStats, RecordingSummary,
    TrendAlerts, TrendSnapshot,
};
pub use analysis::trend::TrendFeature;
pub use config::PipelineConfig;
pub use error::DspError;
pub use pipeline::{FeatureSink, NullSink, Pipeline};

/// Analyse a complete recording offline
///
/// Feeds `pcm` through a synchronous [`Pipeline`] one block at a time and
/// collects every cycle report plus the final trend state.
///
/// # Arguments
///
/// * `pcm` - Mono 16-bit PCM at `config.sample_rate`
/// * `config` - Pipeline configuration
///
/// # Returns
///
/// `RecordingSummary` with one report per extracted cardiac window, the
/// trend snapshots, alert flags and pipeline counters
///
/// # Errors
///
/// Returns `DspError::InvalidInput` for an empty recording and
/// `DspError::InvalidConfig` if `config` fails validation.
///
/// # Example
///
/// ```no_run
/// use phono_dsp::{analyze_recording, PipelineConfig};
///
/// let pcm = vec![0i16; 16_000 * 10]; // 10 seconds of silence
/// let summary = analyze_recording(&pcm, PipelineConfig::default())?;
/// assert!(summary.cycles.is_empty());
/// # Ok::<(), phono_dsp::DspError>(())
/// ```
pub fn analyze_recording(pcm: &[i16], config: PipelineConfig) -> Result<RecordingSummary, DspError> {
    log::debug!(
        "Starting recording analysis: {} samples at {} Hz",
        pcm.len(),
        config.sample_rate
    );

    if pcm.is_empty() {
        return Err(DspError::InvalidInput("Empty recording".to_string()));
    }

    let sample_rate = config.sample_rate;
    let block_size = config.ring.block_size;
    let mut pipeline = Pipeline::new(config, NullSink)?.keep_reports();

    for block in pcm.chunks(block_size) {
        // only length errors are possible here, and chunks() rules them out
        pipeline.push_block(block)?;
    }

    let cycles = pipeline.take_reports();
    let stats = pipeline.stats();
    let alerts = pipeline.alerts();
    let trends = pipeline.trends();

    log::debug!(
        "Recording analysed: {} cycles, {} missed, alerts {:#06b}",
        stats.cycles_analysed,
        stats.missed_cycles,
        alerts.code()
    );

    Ok(RecordingSummary {
        duration_seconds: pcm.len() as f32 / sample_rate as f32,
        sample_rate,
        s1_rms_trend: trends.get(TrendFeature::S1Rms).snapshot(),
        s1_centroid_trend: trends.get(TrendFeature::S1Centroid).snapshot(),
        s2_rms_trend: trends.get(TrendFeature::S2Rms).snapshot(),
        s2_centroid_trend: trends.get(TrendFeature::S2Centroid).snapshot(),
        cycles,
        alerts,
        stats,
    })
}
