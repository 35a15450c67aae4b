//! Feature extraction modules
//!
//! - Streaming envelope peak detection and S1/S2 validation
//! - Per-cycle window analysis (STE peaks, positional labeling, RMS, centroid)

pub mod peaks;
pub mod window;
