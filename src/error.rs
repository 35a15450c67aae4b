//! Error types for the heart-sound processing pipeline
//!
//! Every per-cycle failure is a value of [`DspError`]. None of them abort the
//! stream: callers log, count, and move on to the next block or cycle.

use std::fmt;

/// Errors that can occur while processing the phonocardiogram stream
#[derive(Debug, Clone, PartialEq)]
pub enum DspError {
    /// Invalid input parameters or malformed data
    InvalidInput(String),

    /// Configuration rejected at startup
    InvalidConfig(String),

    /// Window extraction range is negative or empty
    InvalidRange {
        /// Absolute start sample (after pre padding)
        start: i64,
        /// Absolute end sample (after post padding)
        end: i64,
    },

    /// Requested samples have already been overwritten in the ring store
    CapacityExceeded {
        /// Absolute index of the next sample to be written
        latest: u64,
        /// Absolute start sample of the request
        start: i64,
        /// Absolute end sample of the request
        end: i64,
        /// Ring store capacity in samples
        capacity: u64,
    },

    /// Cardiac window longer than the scratch buffer allows
    WindowTooLong {
        /// Requested window length in samples
        len: usize,
        /// Maximum supported window length in samples
        max: usize,
    },

    /// Not enough samples to answer the query (e.g. trend slope)
    InsufficientData {
        /// Samples currently available
        have: usize,
        /// Samples required
        need: usize,
    },

    /// Feature sub-window was clipped at a window edge
    SubWindowMismatch {
        /// Required sub-window length
        expected: usize,
        /// Length available after clipping
        actual: usize,
    },

    /// A bounded queue was full and the item was dropped
    QueueFull(&'static str),

    /// Acquisition collaborator failed (fatal for the producer)
    Acquisition(String),

    /// Transport collaborator refused a record (non-fatal)
    Transport(String),

    /// A pipeline worker thread panicked
    WorkerPanicked(&'static str),
}

impl fmt::Display for DspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DspError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            DspError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            DspError::InvalidRange { start, end } => {
                write!(f, "Invalid window range: start={}, end={}", start, end)
            }
            DspError::CapacityExceeded {
                latest,
                start,
                end,
                capacity,
            } => write!(
                f,
                "Window [{}, {}) exceeds ring capacity {} (latest={})",
                start, end, capacity, latest
            ),
            DspError::WindowTooLong { len, max } => {
                write!(f, "Window too long: {} samples (max {})", len, max)
            }
            DspError::InsufficientData { have, need } => {
                write!(f, "Insufficient data: have {}, need {}", have, need)
            }
            DspError::SubWindowMismatch { expected, actual } => write!(
                f,
                "Sub-window length mismatch: expected {}, got {}",
                expected, actual
            ),
            DspError::QueueFull(queue) => write!(f, "Queue full: {}", queue),
            DspError::Acquisition(msg) => write!(f, "Acquisition error: {}", msg),
            DspError::Transport(msg) => write!(f, "Transport error: {}", msg),
            DspError::WorkerPanicked(worker) => write!(f, "Worker panicked: {}", worker),
        }
    }
}

impl std::error::Error for DspError {}

impl DspError {
    /// True for failures that only drop the current block or cycle
    ///
    /// Acquisition failures, configuration errors and dead workers are the
    /// only non-recoverable kinds.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DspError::Acquisition(_) | DspError::InvalidConfig(_) | DspError::WorkerPanicked(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_capacity_exceeded() {
        let err = DspError::CapacityExceeded {
            latest: 40_000,
            start: 100,
            end: 900,
            capacity: 32_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("32000"), "message should name capacity: {}", msg);
        assert!(msg.contains("[100, 900)"), "message should name range: {}", msg);
    }

    #[test]
    fn test_display_queue_full_names_queue() {
        assert_eq!(DspError::QueueFull("peak").to_string(), "Queue full: peak");
        assert_eq!(DspError::QueueFull("audio").to_string(), "Queue full: audio");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(DspError::QueueFull("peak").is_recoverable());
        assert!(DspError::InvalidRange { start: -1, end: 10 }.is_recoverable());
        assert!(DspError::Transport("not subscribed".to_string()).is_recoverable());
        assert!(!DspError::Acquisition("timeout".to_string()).is_recoverable());
        assert!(!DspError::InvalidConfig("zero block".to_string()).is_recoverable());
    }
}
