//! Example: Replay a WAV recording through the threaded pipeline
//!
//! Usage: `cargo run --example replay_wav -- <file.wav> [--paced]`
//!
//! Feature records are printed as they arrive on the transport channel, the
//! way a BLE subscriber would receive them.

use std::thread;

use crossbeam_channel::bounded;
use phono_dsp::io::ReplaySource;
use phono_dsp::pipeline::{self, ChannelSink};
use phono_dsp::config::InputKind;
use phono_dsp::{FeatureRecord, PipelineConfig};

/// Load a WAV file as mono 16-bit PCM, returning (pcm, sample_rate)
fn load_wav(path: &str) -> Result<(Vec<i16>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let pcm = samples
        .chunks(channels)
        .map(|frame| {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            (mono.clamp(-1.0, 1.0) * 32767.0) as i16
        })
        .collect();

    Ok((pcm, spec.sample_rate))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("Usage: {} <file.wav> [--paced]", args[0]);
        std::process::exit(2);
    };
    let paced = args.iter().any(|a| a == "--paced");

    let (pcm, sample_rate) = load_wav(path)?;
    let mut config = PipelineConfig::default();
    config.input = InputKind::FileReplay;
    if sample_rate != config.sample_rate {
        log::warn!(
            "{} is {} Hz, filters are tuned for {} Hz",
            path,
            sample_rate,
            config.sample_rate
        );
        config.sample_rate = sample_rate;
    }
    println!(
        "Replaying {} ({:.1} s at {} Hz)",
        path,
        pcm.len() as f32 / sample_rate as f32,
        sample_rate
    );

    let mut source = ReplaySource::new(pcm, config.ring.block_size);
    if paced {
        source = source.paced(sample_rate);
    }

    let (tx, rx) = bounded::<FeatureRecord>(32);
    let subscriber = thread::spawn(move || {
        for record in rx.iter() {
            println!(
                "  {:>8} ms  S1 rms {:.4}  centroid {:>6.1} Hz",
                record.timestamp_ms, record.rms, record.centroid
            );
        }
    });

    let handle = pipeline::spawn(config, source, ChannelSink::new(tx))?;
    let output = handle.join()?;
    drop(output.sink);
    let _ = subscriber.join();

    if let Some(e) = &output.acquisition_error {
        eprintln!("Acquisition stopped early: {}", e);
    }

    let stats = output.stats;
    println!("Results:");
    println!("  Blocks: {} ingested, {} dropped", stats.blocks_ingested, stats.blocks_dropped);
    println!(
        "  Peaks: {} detected, {} S1, {} S2, {} unvalidated",
        stats.peaks_detected, stats.peaks_s1, stats.peaks_s2, stats.peaks_unvalidated
    );
    println!(
        "  Cycles: {} analysed, {} missed, {} windows dropped",
        stats.cycles_analysed, stats.missed_cycles, stats.windows_dropped
    );
    println!("  Alerts: {:#06b} {:?}", output.alerts.code(), output.alerts);

    Ok(())
}
