//! Cycle-level analysis
//!
//! - Cardiac window extraction from consecutive S1 events
//! - Rolling trend slopes and alerts
//! - Result types

pub mod processor;
pub mod result;
pub mod trend;

pub use processor::{PeakProcessor, WindowConsumer};
pub use result::{
    CycleReport, FeatureRecord, HeartSoundFeatures, PipelineStats, RecordingSummary,
    TrendAlerts, TrendSnapshot,
};
pub use trend::{TrendAnalyser, TrendBank, TrendFeature};
