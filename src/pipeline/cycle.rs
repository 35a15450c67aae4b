//! Window consumer that closes the loop: analysis, trends, transport

use std::sync::Arc;

use super::stats::{Counter, StatsCounters};
use super::transport::FeatureSink;
use crate::analysis::result::{CycleReport, TrendAlerts};
use crate::analysis::trend::TrendBank;
use crate::analysis::WindowConsumer;
use crate::config::PipelineConfig;
use crate::error::DspError;
use crate::features::window::WindowAnalyser;

/// Analyses each cardiac window and fans the result out
///
/// Every report feeds the trend bank; every S1 record goes to the sink.
/// Reports are kept only after [`CycleAnalyser::retain_reports`].
#[derive(Debug)]
pub struct CycleAnalyser<S> {
    analyser: WindowAnalyser,
    trends: TrendBank,
    sink: S,
    stats: Arc<StatsCounters>,
    reports: Option<Vec<CycleReport>>,
    last_report: Option<CycleReport>,
}

impl<S: FeatureSink> CycleAnalyser<S> {
    /// Build from the window-analysis and trend sections of `config`
    pub fn new(config: &PipelineConfig, sink: S, stats: Arc<StatsCounters>) -> Result<Self, DspError> {
        Ok(Self {
            analyser: WindowAnalyser::new(&config.window, config.sample_rate)?,
            trends: TrendBank::new(&config.trends),
            sink,
            stats,
            reports: None,
            last_report: None,
        })
    }

    /// Retain every report from now on, see [`Self::take_reports`]
    pub fn retain_reports(&mut self) {
        if self.reports.is_none() {
            self.reports = Some(Vec::new());
        }
    }

    /// Trend analysers
    pub fn trends(&self) -> &TrendBank {
        &self.trends
    }

    /// Current alert state
    pub fn alerts(&self) -> TrendAlerts {
        self.trends.alerts()
    }

    /// Most recent report
    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    /// Take the retained reports, leaving an empty list
    pub fn take_reports(&mut self) -> Vec<CycleReport> {
        self.reports.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Feature sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Split into sink and trend bank
    pub fn into_parts(self) -> (S, TrendBank) {
        (self.sink, self.trends)
    }

    fn handle(&mut self, window: &[f32], window_start_index: i64) {
        let report = self.analyser.analyse(window, window_start_index);
        self.stats.incr(Counter::CyclesAnalysed);

        if report.is_missed() {
            self.stats.incr(Counter::MissedCycles);
        }
        self.trends.update_from_cycle(&report);

        if let Some(record) = report.s1_record() {
            match self.sink.send(&record) {
                Ok(()) => self.stats.incr(Counter::RecordsSent),
                Err(e) => {
                    log::warn!("Dropping feature record at {} ms: {}", record.timestamp_ms, e);
                    self.stats.incr(Counter::RecordsDropped);
                }
            }
        }

        if let Some(reports) = self.reports.as_mut() {
            reports.push(report.clone());
        }
        self.last_report = Some(report);
    }
}

impl<S: FeatureSink> WindowConsumer for CycleAnalyser<S> {
    fn consume(&mut self, window: &[f32], window_start_index: i64) {
        self.handle(window, window_start_index);
    }
}
