//! Example: Stream a synthetic phonocardiogram with a fading S1
//!
//! S1 loudness drops a little every beat. After enough cycles the S1 RMS
//! trend goes negative and its alert bit is set.

use std::time::Duration;

use phono_dsp::io::ReplaySource;
use phono_dsp::pipeline::{self, VecSink};
use phono_dsp::{analyze_recording, PipelineConfig, TrendFeature};

const FS: u32 = 16_000;

fn synthetic_pcg(seconds: f32, bpm: f32) -> Vec<i16> {
    let period = 60.0 / bpm;
    let n = (seconds * FS as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / FS as f32;
            let beat = (t / period).floor();
            let phase = t - beat * period;
            let s1_gain = 0.6 * 0.98f32.powf(beat);
            let env = s1_gain * (-((phase - 0.05) / 0.02).powi(2)).exp()
                + 0.3 * (-((phase - 0.05 - 0.3 * period) / 0.02).powi(2)).exp();
            let x = env * (2.0 * std::f32::consts::PI * 60.0 * t).sin();
            (x * 32767.0) as i16
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let pcm = synthetic_pcg(40.0, 72.0);

    // Offline pass
    let summary = analyze_recording(&pcm, PipelineConfig::default())?;
    println!("Offline: {} cycles", summary.cycles.len());
    if let Some(bpm) = summary.heart_rate_bpm() {
        println!("  Heart rate: {:.1} bpm", bpm);
    }
    println!("  S1 RMS trend: {:?}", summary.s1_rms_trend);
    println!("  S1 centroid trend: {:?}", summary.s1_centroid_trend);

    // Live pass at 4x real time, polling alerts while it runs
    let mut config = PipelineConfig::default();
    config.queues.audio_capacity = 32;
    let source = ReplaySource::new(pcm, config.ring.block_size).paced(FS * 4);
    let handle = pipeline::spawn(config, source, VecSink::new())?;

    while !handle.is_finished() {
        std::thread::sleep(Duration::from_millis(500));
        let stats = handle.stats();
        println!(
            "  [{:>5} blocks] {} cycles, alerts {:#06b}",
            stats.blocks_ingested,
            stats.cycles_analysed,
            handle.alerts().code()
        );
    }

    let output = handle.join()?;
    println!("Live: {} records", output.sink.records.len());
    let s1 = output.trends.get(TrendFeature::S1Rms).snapshot();
    println!("  S1 RMS slope {:?} per ms, alert {}", s1.slope, s1.alert);
    if let Some(last) = output.sink.records.last() {
        println!("  Last record bytes: {:02x?}", last.to_le_bytes());
    }

    Ok(())
}
