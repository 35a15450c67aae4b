//! Integration tests for the heart-sound pipeline

use std::f32::consts::PI;

use crossbeam_channel::bounded;
use phono_dsp::analysis::{PeakProcessor, TrendBank};
use phono_dsp::config::PipelineConfig;
use phono_dsp::features::peaks::{PeakEvent, PeakLabel};
use phono_dsp::io::{ReplaySource, RingWindowStore};
use phono_dsp::pipeline::{self, ChannelSink, VecSink};
use phono_dsp::{
    analyze_recording, CycleReport, DspError, HeartSoundFeatures, Pipeline, TrendFeature,
};

const FS: u32 = 16_000;

/// Synthetic phonocardiogram: Gaussian-windowed tone bursts for S1 and S2
///
/// S1 every `period_s`, S2 `s2_delay_s` after it, both 60 Hz with a 40 ms
/// envelope. `s1_decay` scales each successive S1 amplitude.
fn synthetic_pcg(seconds: f32, period_s: f32, s2_delay_s: f32, s1_decay: f32) -> Vec<i16> {
    let n = (seconds * FS as f32) as usize;
    let mut out = vec![0.0f32; n];
    let width = 0.04 * FS as f32;
    let mut add_burst = |center: f32, amplitude: f32| {
        let lo = (center - 3.0 * width).max(0.0) as usize;
        let hi = ((center + 3.0 * width) as usize).min(n);
        for (i, x) in out.iter_mut().enumerate().take(hi).skip(lo) {
            let t = i as f32 - center;
            let g = (-0.5 * (t / (width / 2.0)).powi(2)).exp();
            *x += amplitude * g * (2.0 * PI * 60.0 * i as f32 / FS as f32).sin();
        }
    };

    let mut beat = 0;
    let mut t = 0.2;
    while t < seconds {
        let s1_amp = 0.6 * s1_decay.powi(beat);
        add_burst(t * FS as f32, s1_amp);
        add_burst((t + s2_delay_s) * FS as f32, 0.35);
        t += period_s;
        beat += 1;
    }

    out.iter()
        .map(|&x| (x.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

fn roomy_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    // hold a whole 20 s recording so no window ages out under thread jitter
    config.ring.num_blocks = 220;
    config.queues.audio_capacity = 256;
    config.queues.peak_capacity = 256;
    config
}

fn assert_stats_consistent(summary_cycles: usize, stats: &phono_dsp::PipelineStats) {
    assert_eq!(summary_cycles as u64, stats.cycles_analysed);
    assert_eq!(stats.windows_extracted, stats.cycles_analysed);
    assert_eq!(
        stats.records_sent + stats.records_dropped,
        stats.cycles_analysed - stats.missed_cycles
    );
    assert!(stats.peaks_s1 + stats.peaks_s2 + stats.peaks_unvalidated <= stats.peaks_detected);
    assert!(stats.windows_extracted + stats.windows_dropped <= stats.peaks_s1);
}

#[test]
fn test_analyze_recording_rejects_empty() {
    assert!(matches!(
        analyze_recording(&[], PipelineConfig::default()),
        Err(DspError::InvalidInput(_))
    ));
}

#[test]
fn test_analyze_recording_rejects_invalid_config() {
    let mut config = PipelineConfig::default();
    config.sample_rate = 0;
    assert!(matches!(
        analyze_recording(&[0; 1600], config),
        Err(DspError::InvalidConfig(_))
    ));
}

#[test]
fn test_analyze_silence() {
    let pcm = vec![0i16; FS as usize * 5];
    let summary = analyze_recording(&pcm, PipelineConfig::default()).unwrap();

    assert!((summary.duration_seconds - 5.0).abs() < 1e-6);
    assert_eq!(summary.sample_rate, FS);
    assert!(summary.cycles.is_empty());
    assert_eq!(summary.stats.blocks_ingested, 50);
    assert_eq!(summary.s1_rms_trend.count, 0);
    assert_eq!(summary.s1_rms_trend.slope, None);
    assert!(!summary.alerts.any());
    assert_eq!(summary.heart_rate_bpm(), None);
}

#[test]
fn test_analyze_synthetic_pcg() {
    let _ = env_logger::builder().is_test(true).try_init();

    let pcm = synthetic_pcg(20.0, 0.8, 0.3, 1.0);
    // 320000 samples, not a multiple of the block size is fine too
    let summary = analyze_recording(&pcm[..pcm.len() - 700], roomy_config()).unwrap();

    assert_eq!(summary.stats.blocks_ingested, 200);
    assert_eq!(summary.stats.blocks_dropped, 0);
    assert_stats_consistent(summary.cycles.len(), &summary.stats);

    for pair in summary.cycles.windows(2) {
        assert!(pair[0].window_start_index < pair[1].window_start_index);
        assert!(pair[0].timestamp_ms <= pair[1].timestamp_ms);
    }
    for cycle in &summary.cycles {
        assert!(cycle.window_len > 0);
        assert_eq!(cycle.ste_len, cycle.window_len / 160);
        if let Some(s1) = cycle.s1 {
            assert!(s1.rms >= 0.0);
            assert!(s1.centroid >= 0.0 && s1.centroid <= FS as f32 / 2.0);
            let end = cycle.window_start_index + cycle.window_len as i64;
            assert!(s1.audio_index >= cycle.window_start_index && s1.audio_index < end);
        }
    }
    assert_eq!(
        summary.analysed_cycles().count() as u64,
        summary.stats.cycles_analysed - summary.stats.missed_cycles
    );

    // 24 beats: every S1-to-S1 interval becomes an analysed cycle
    assert!(
        summary.stats.cycles_analysed >= 20,
        "expected most of the 23 intervals, got {:?}",
        summary.stats
    );
    assert_eq!(summary.stats.missed_cycles, 0);
    let bpm = summary.heart_rate_bpm().unwrap();
    assert!((bpm - 75.0).abs() < 1.0, "heart rate {}", bpm);

    // S1 lands on a synthetic S1 burst, late by at most the band-pass delay
    for cycle in &summary.cycles {
        let s1 = cycle.s1.unwrap();
        let beat = ((s1.audio_index - 3200) as f32 / 12_800.0).round() as i64;
        let offset = s1.audio_index - (3200 + beat * 12_800);
        assert!(
            offset.abs() <= 640,
            "S1 at {} is {} samples from the nearest S1 burst",
            s1.audio_index,
            offset
        );
    }
}

#[test]
fn test_analyze_recording_tracks_slower_rate() {
    let pcm = synthetic_pcg(20.0, 1.0, 0.3, 1.0);
    let summary = analyze_recording(&pcm, PipelineConfig::default()).unwrap();

    assert!(summary.stats.cycles_analysed >= 15, "{:?}", summary.stats);
    let bpm = summary.heart_rate_bpm().unwrap();
    assert!((bpm - 60.0).abs() < 1.0, "heart rate {}", bpm);
}

#[test]
fn test_pipeline_matches_runtime() {
    let pcm = synthetic_pcg(20.0, 0.8, 0.3, 0.97);

    let mut offline = Pipeline::new(roomy_config(), VecSink::new()).unwrap();
    for block in pcm.chunks(1600) {
        offline.push_block(block).unwrap();
    }
    let offline_stats = offline.stats();
    let offline_alerts = offline.alerts();
    let (offline_sink, _) = offline.into_parts();

    let handle = pipeline::spawn(
        roomy_config(),
        ReplaySource::new(pcm, 1600),
        VecSink::new(),
    )
    .unwrap();
    let output = handle.join().unwrap();

    assert!(output.acquisition_error.is_none());
    assert!(!offline_sink.records.is_empty());
    assert!(offline_stats.cycles_analysed > 0);
    assert_eq!(output.stats, offline_stats);
    assert_eq!(output.alerts, offline_alerts);
    assert_eq!(output.sink.records, offline_sink.records);
}

#[test]
fn test_runtime_streams_records_over_channel() {
    let pcm = synthetic_pcg(10.0, 0.8, 0.3, 1.0);
    let (tx, rx) = bounded(64);

    let handle = pipeline::spawn(roomy_config(), ReplaySource::new(pcm, 1600), ChannelSink::new(tx))
        .unwrap();
    let output = handle.join().unwrap();

    // the sink (and its sender) came back with the output
    drop(output.sink);
    let received: Vec<_> = rx.iter().collect();
    assert_eq!(received.len() as u64, output.stats.records_sent);
    assert_eq!(output.stats.records_dropped, 0);
    for pair in received.windows(2) {
        assert!(pair[0].timestamp_ms <= pair[1].timestamp_ms);
    }
}

#[test]
fn test_runtime_counts_unsubscribed_records() {
    let pcm = synthetic_pcg(10.0, 0.8, 0.3, 1.0);
    let (tx, rx) = bounded(64);
    drop(rx);

    let handle = pipeline::spawn(roomy_config(), ReplaySource::new(pcm, 1600), ChannelSink::new(tx))
        .unwrap();
    let output = handle.join().unwrap();

    assert_eq!(output.stats.records_sent, 0);
    assert_eq!(
        output.stats.records_dropped,
        output.stats.cycles_analysed - output.stats.missed_cycles
    );
}

#[test]
fn test_window_extraction_from_consecutive_s1() {
    let mut store = RingWindowStore::new(20, 1600).unwrap();
    let ramp: Vec<f32> = (0..32_000).map(|i| i as f32).collect();
    for block in ramp.chunks(1600) {
        store.push_block(block).unwrap();
    }

    let config = PipelineConfig::default();
    let mut seen = Vec::new();
    let mut processor = PeakProcessor::new(&config.processor, |w: &[f32], start: i64| {
        seen.push((start, w.len(), w[0], w[w.len() - 1]));
    });

    let s1 = |at: i64| PeakEvent {
        value: 1.0,
        global_index: at,
        label: PeakLabel::S1,
    };
    let s2 = PeakEvent {
        value: 0.5,
        global_index: 8000,
        label: PeakLabel::S2,
    };

    assert!(!processor.process_peak(&s1(4000), &store).unwrap());
    assert!(!processor.process_peak(&s2, &store).unwrap());
    assert!(processor.process_peak(&s1(16_000), &store).unwrap());
    drop(processor);

    // period 12000, pre = min(0.25 * 12000, 2000)
    assert_eq!(seen, vec![(2000, 12_000, 2000.0, 13_999.0)]);
}

#[test]
fn test_trend_bank_alerts_on_declining_s1() {
    let config = PipelineConfig::default();
    let mut bank = TrendBank::new(&config.trends);

    for k in 0..10 {
        let report = CycleReport {
            window_start_index: k * 12_800,
            timestamp_ms: (k * 800) as u32,
            window_len: 12_800,
            ste_len: 80,
            peaks: Vec::new(),
            s1: Some(HeartSoundFeatures {
                audio_index: k * 12_800 + 1000,
                rms: 0.5 - 0.02 * k as f32,
                centroid: 90.0,
            }),
            s2: None,
        };
        bank.update_from_cycle(&report);
        let alerts = bank.alerts();
        // warm-up: no slope before five samples
        assert_eq!(alerts.s1_rms, k >= 4, "cycle {}", k);
        assert!(!alerts.s1_centroid);
    }

    let snapshot = bank.get(TrendFeature::S1Rms).snapshot();
    assert_eq!(snapshot.count, 10);
    let slope = snapshot.slope.unwrap();
    assert!((slope - (-0.02 / 800.0)).abs() < 1e-7, "slope {}", slope);
    assert_eq!(bank.get(TrendFeature::S2Rms).count(), 0);
    assert_eq!(bank.alert_code(), 0b0001);
}
