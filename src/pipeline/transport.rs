//! Transport seam for per-cycle feature records
//!
//! The radio link (BLE notifications on the device) lives outside the DSP
//! core. Analysis hands every S1 record to a [`FeatureSink`]; a refused record
//! is logged and counted by the caller, never retried.

use crossbeam_channel::{Sender, TrySendError};

use crate::analysis::result::FeatureRecord;
use crate::error::DspError;

/// Destination for feature records
pub trait FeatureSink {
    /// Deliver one record
    ///
    /// # Errors
    ///
    /// `DspError::Transport` when the record could not be delivered (no
    /// subscriber, link congested). The caller drops the record.
    fn send(&mut self, record: &FeatureRecord) -> Result<(), DspError>;
}

impl<T: FeatureSink + ?Sized> FeatureSink for Box<T> {
    fn send(&mut self, record: &FeatureRecord) -> Result<(), DspError> {
        (**self).send(record)
    }
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FeatureSink for NullSink {
    fn send(&mut self, _record: &FeatureRecord) -> Result<(), DspError> {
        Ok(())
    }
}

/// Collects records in memory
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    /// Records in delivery order
    pub records: Vec<FeatureRecord>,
}

impl VecSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureSink for VecSink {
    fn send(&mut self, record: &FeatureRecord) -> Result<(), DspError> {
        self.records.push(*record);
        Ok(())
    }
}

/// Forwards records over a bounded channel without blocking
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<FeatureRecord>,
}

impl ChannelSink {
    /// Wrap the sending half of a channel
    pub fn new(tx: Sender<FeatureRecord>) -> Self {
        Self { tx }
    }
}

impl FeatureSink for ChannelSink {
    fn send(&mut self, record: &FeatureRecord) -> Result<(), DspError> {
        match self.tx.try_send(*record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DspError::Transport("channel full".to_string())),
            Err(TrySendError::Disconnected(_)) => {
                Err(DspError::Transport("not subscribed".to_string()))
            }
        }
    }
}
