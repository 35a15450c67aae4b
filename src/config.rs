//! Configuration parameters for the heart-sound pipeline
//!
//! One sub-config per component. All of them are built once at startup and
//! handed to their component by value; nothing reads configuration at run
//! time. Defaults are the values tuned on the 16 kHz patch recordings.

use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Upper bound on the rolling buffer of a single trend analyser
pub const TREND_MAX_BUFFER: usize = 30;

/// Which acquisition collaborator feeds the ingest queue
///
/// Purely glue: every variant delivers the same `AcquisitionMessage` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// Live microphone capture
    Microphone,
    /// Replay of a stored recording
    FileReplay,
    /// Live capture that is also recorded by the acquisition layer
    ReplayToFile,
}

/// Ring store geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Samples per audio block (default: 1600, 100 ms at 16 kHz)
    pub block_size: usize,

    /// Number of blocks retained (default: 20, 2 s of history)
    pub num_blocks: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            block_size: 1600,
            num_blocks: 20,
        }
    }
}

impl RingConfig {
    /// Total history length in samples
    pub fn capacity(&self) -> usize {
        self.block_size * self.num_blocks
    }
}

/// Streaming envelope peak detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Running-mean smoothing factor (default: 0.0001)
    pub alpha: f32,

    /// Threshold as a multiple of the running mean (default: 2.0)
    pub threshold_scale: f32,

    /// Refractory distance between peaks in samples (default: 2000)
    pub min_distance: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alpha: 0.0001,
            threshold_scale: 2.0,
            min_distance: 2000,
        }
    }
}

/// Timing-ratio peak validator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// First gap below `close_r * T` counts as "short" (default: 0.45)
    pub close_r: f32,

    /// Second gap above `far_r * T` counts as "long" (default: 0.55)
    pub far_r: f32,

    /// Half-width of the equal-spacing band around 0.5 (default: 0.05)
    pub margin: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            close_r: 0.45,
            far_r: 0.55,
            margin: 0.05,
        }
    }
}

/// Per-S1 cardiac window extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Padding as a fraction of the S1-S1 period (default: 0.25)
    pub pre_ratio: f32,

    /// Minimum padding in samples (default: 200)
    pub pre_min: i64,

    /// Maximum padding in samples, 0 disables the cap (default: 2000)
    pub pre_max: i64,

    /// Largest window the scratch buffer accepts (default: 32000)
    pub max_window_len: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            pre_ratio: 0.25,
            pre_min: 200,
            pre_max: 2000,
            max_window_len: RingConfig::default().capacity(),
        }
    }
}

/// Per-cycle window analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowAnalysisConfig {
    /// Audio hard-limit factor on `mean(|x|)`, `None` skips (default: 1/3)
    pub audio_hl_thresh: Option<f32>,

    /// Samples per STE block (default: 160, 10 ms at 16 kHz)
    pub ste_block_size: usize,

    /// STE hard-limit factor on `mean(|ste|)`, `None` skips (default: 0.4)
    pub ste_hl_thresh: Option<f32>,

    /// STE peak threshold as a multiple of the STE mean (default: 0.7)
    pub peak_thresh_scale: f32,

    /// Minimum STE-index distance between accepted peaks (default: 1)
    pub peak_min_distance: usize,

    /// Cluster width as a fraction of the STE length (default: 0.2)
    pub de_cluster_window_r: f32,

    /// S1 must sit at or before this fraction of the window (default: 0.3)
    pub ident_s1_reject_r: f32,

    /// Expected S1-S2 gap as a fraction of the window (default: 0.29)
    pub ident_s1_s2_gap_r: f32,

    /// Accepted deviation around the expected gap (default: 0.15)
    pub ident_s1_s2_gap_tol: f32,

    /// Spectral sub-window length around each heart sound (default: 512)
    pub spectral_window: usize,

    /// Upper bound on STE peaks kept per window (default: 64)
    pub max_window_peaks: usize,
}

impl Default for WindowAnalysisConfig {
    fn default() -> Self {
        Self {
            audio_hl_thresh: Some(1.0 / 3.0),
            ste_block_size: 160,
            ste_hl_thresh: Some(0.4),
            peak_thresh_scale: 0.7,
            peak_min_distance: 1,
            de_cluster_window_r: 0.2,
            ident_s1_reject_r: 0.3,
            ident_s1_s2_gap_r: 0.29,
            ident_s1_s2_gap_tol: 0.15,
            spectral_window: 512,
            max_window_peaks: 64,
        }
    }
}

/// Rolling slope analyser for one tracked feature
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Rolling buffer length, at most [`TREND_MAX_BUFFER`] (default: 30)
    pub buffer_size: usize,

    /// Slope (feature units per ms) below which the trend alerts
    pub slope_alert_thresh: f32,

    /// Samples required before a slope is reported (default: 5)
    pub min_windows: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            buffer_size: TREND_MAX_BUFFER,
            slope_alert_thresh: -1.0e-6,
            min_windows: 5,
        }
    }
}

/// Trend configs for every tracked feature
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendBankConfig {
    /// S1 RMS trend
    pub s1_rms: TrendConfig,
    /// S1 spectral centroid trend (Hz per ms)
    pub s1_centroid: TrendConfig,
    /// S2 RMS trend
    pub s2_rms: TrendConfig,
    /// S2 spectral centroid trend (Hz per ms)
    pub s2_centroid: TrendConfig,
}

impl Default for TrendBankConfig {
    fn default() -> Self {
        let centroid = TrendConfig {
            slope_alert_thresh: -1.0e-3,
            ..TrendConfig::default()
        };
        Self {
            s1_rms: TrendConfig::default(),
            s1_centroid: centroid.clone(),
            s2_rms: TrendConfig::default(),
            s2_centroid: centroid,
        }
    }
}

/// Biquad coefficients, CMSIS layout `[b0, b1, b2, -a1, -a2]` per stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Band-pass cascade (default: 4-stage Butterworth, 30-150 Hz @ 16 kHz)
    pub bandpass: Vec<[f32; 5]>,

    /// Envelope low-pass cascade (default: 2nd-order Butterworth, 13 Hz)
    pub envelope_lowpass: Vec<[f32; 5]>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bandpass: vec![
                [0.000_000_29, 0.000_000_58, 0.000_000_29, 1.936_944_8, -0.938_726_9],
                [1.0, 2.0, 1.0, 1.967_464_3, -0.970_689_3],
                [1.0, -2.0, 1.0, 1.976_157_9, -0.976_416_8],
                [1.0, -2.0, 1.0, 1.993_564_5, -0.993_711_1],
            ],
            envelope_lowpass: vec![[
                0.000_006_492_032,
                0.000_012_984_064,
                0.000_006_492_032,
                1.992_780_3,
                -0.992_806_3,
            ]],
        }
    }
}

/// Bounded queue sizing between pipeline workers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Audio block queue capacity (default: 8)
    pub audio_capacity: usize,

    /// Validated peak queue capacity (default: 16)
    pub peak_capacity: usize,

    /// How long the producer waits on a full audio queue before dropping
    /// the block, in milliseconds (default: 100)
    pub send_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            audio_capacity: 8,
            peak_capacity: 16,
            send_timeout_ms: 100,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sample rate in Hz (default: 16000)
    pub sample_rate: u32,

    /// Acquisition source selection (default: Microphone)
    pub input: InputKind,

    /// Ring store geometry
    pub ring: RingConfig,

    /// Filter coefficients
    pub filters: FilterConfig,

    /// Envelope peak detector
    pub detector: DetectorConfig,

    /// Peak validator
    pub validator: ValidatorConfig,

    /// Cardiac window extraction
    pub processor: ProcessorConfig,

    /// Window analysis
    pub window: WindowAnalysisConfig,

    /// Trend analysers
    pub trends: TrendBankConfig,

    /// Worker queues
    pub queues: QueueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            input: InputKind::Microphone,
            ring: RingConfig::default(),
            filters: FilterConfig::default(),
            detector: DetectorConfig::default(),
            validator: ValidatorConfig::default(),
            processor: ProcessorConfig::default(),
            window: WindowAnalysisConfig::default(),
            trends: TrendBankConfig::default(),
            queues: QueueConfig::default(),
        }
    }
}

fn check_ratio(name: &str, value: f32) -> Result<(), DspError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DspError::InvalidConfig(format!(
            "{} must be in [0.0, 1.0], got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_nonzero(name: &str, value: usize) -> Result<(), DspError> {
    if value == 0 {
        return Err(DspError::InvalidConfig(format!("{} must be > 0", name)));
    }
    Ok(())
}

impl TrendConfig {
    /// Validate a single trend config
    pub fn validate(&self, name: &str) -> Result<(), DspError> {
        check_nonzero(name, self.buffer_size)?;
        if self.buffer_size > TREND_MAX_BUFFER {
            return Err(DspError::InvalidConfig(format!(
                "{} buffer_size {} exceeds maximum {}",
                name, self.buffer_size, TREND_MAX_BUFFER
            )));
        }
        if self.min_windows > self.buffer_size {
            return Err(DspError::InvalidConfig(format!(
                "{} min_windows {} can never be reached with buffer_size {}",
                name, self.min_windows, self.buffer_size
            )));
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DspError> {
        if self.sample_rate == 0 {
            return Err(DspError::InvalidConfig("sample_rate must be > 0".to_string()));
        }
        check_nonzero("ring.block_size", self.ring.block_size)?;
        check_nonzero("ring.num_blocks", self.ring.num_blocks)?;
        check_nonzero("window.ste_block_size", self.window.ste_block_size)?;
        check_nonzero("window.spectral_window", self.window.spectral_window)?;
        if self.window.spectral_window % 2 != 0 {
            return Err(DspError::InvalidConfig(format!(
                "window.spectral_window must be even, got {}",
                self.window.spectral_window
            )));
        }
        check_nonzero("window.max_window_peaks", self.window.max_window_peaks)?;
        check_nonzero("queues.audio_capacity", self.queues.audio_capacity)?;
        check_nonzero("queues.peak_capacity", self.queues.peak_capacity)?;

        check_ratio("validator.close_r", self.validator.close_r)?;
        check_ratio("validator.far_r", self.validator.far_r)?;
        check_ratio("validator.margin", self.validator.margin)?;
        check_ratio("processor.pre_ratio", self.processor.pre_ratio)?;
        check_ratio("window.de_cluster_window_r", self.window.de_cluster_window_r)?;
        check_ratio("window.ident_s1_reject_r", self.window.ident_s1_reject_r)?;
        check_ratio("window.ident_s1_s2_gap_r", self.window.ident_s1_s2_gap_r)?;
        check_ratio("window.ident_s1_s2_gap_tol", self.window.ident_s1_s2_gap_tol)?;

        if self.processor.pre_min < 0 {
            return Err(DspError::InvalidConfig(
                "processor.pre_min must be >= 0".to_string(),
            ));
        }
        if self.processor.pre_max > 0 && self.processor.pre_min > self.processor.pre_max {
            return Err(DspError::InvalidConfig(format!(
                "processor.pre_min {} exceeds pre_max {}",
                self.processor.pre_min, self.processor.pre_max
            )));
        }
        if self.processor.max_window_len > self.ring.capacity() {
            return Err(DspError::InvalidConfig(format!(
                "processor.max_window_len {} exceeds ring capacity {}",
                self.processor.max_window_len,
                self.ring.capacity()
            )));
        }
        if self.filters.bandpass.is_empty() || self.filters.envelope_lowpass.is_empty() {
            return Err(DspError::InvalidConfig(
                "filter cascades need at least one stage".to_string(),
            ));
        }

        self.trends.s1_rms.validate("trends.s1_rms")?;
        self.trends.s1_centroid.validate("trends.s1_centroid")?;
        self.trends.s2_rms.validate("trends.s2_rms")?;
        self.trends.s2_centroid.validate("trends.s2_centroid")?;

        Ok(())
    }
}
