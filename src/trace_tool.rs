use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use beat_stage::audio::{AudioDecoder, BufferSampler, ManualClock, RodioDecoder, SourceConnection};
use beat_stage::effects::{DropState, VariantConfig};
use beat_stage::scene::{FrameQueue, VisualParameterSet};
use beat_stage::{Stage, StagePhase, TrackSession};

#[derive(Parser)]
#[command(name = "stage-trace")]
#[command(about = "Run the stage pipeline offline over a track and write a per-frame JSON trace")]
struct Args {
    /// Audio file to trace
    input: PathBuf,

    /// Output file for the trace
    #[arg(short, long, default_value = "stage_trace.json")]
    output: PathBuf,

    /// Built-in visualization variant
    #[arg(short, long, default_value = "drop")]
    variant: String,

    /// Load the variant from a JSON file instead
    #[arg(long)]
    variant_file: Option<PathBuf>,

    /// Simulated refresh rate
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=240))]
    fps: u32,

    /// Seed for colour and scatter randomness
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Stop after this many seconds of audio
    #[arg(long)]
    seconds: Option<f64>,
}

/// Nothing is audible offline; the connection only records that it was cut.
#[derive(Default)]
struct SilentConnection {
    disconnected: bool,
}

impl SourceConnection for SilentConnection {
    fn disconnect(&mut self) {
        self.disconnected = true;
    }

    fn is_connected(&self) -> bool {
        !self.disconnected
    }
}

#[derive(Serialize)]
struct TraceFrame {
    index: usize,
    elapsed: f64,
    energy: f32,
    phase: StagePhase,
    band_hits: Vec<usize>,
    noop_hits: usize,
    armed: bool,
    released: bool,
    drop_state: DropState,
    camera: Vec3,
    look_at: Vec3,
}

#[derive(Serialize)]
struct Trace {
    input: PathBuf,
    variant: String,
    bands: Vec<String>,
    fps: u32,
    seed: u64,
    duration_seconds: f64,
    frames: Vec<TraceFrame>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let variant = VariantConfig::load(&args.variant, args.variant_file.as_deref())?;
    info!("Stage trace of {} with variant '{}'", args.input.display(), variant.name);

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    let track = RodioDecoder.decode(bytes).await?;
    info!(
        "Decoded {:.2}s ({}Hz, {} channels, {} frames)",
        track.duration_seconds,
        track.sample_rate,
        track.channels,
        track.frame_count()
    );

    let trace = run_trace(&args, variant, &track)?;
    summarize(&trace);

    let writer = BufWriter::new(
        File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?,
    );
    serde_json::to_writer_pretty(writer, &trace)?;
    info!("✅ Trace written to {}", args.output.display());

    Ok(())
}

fn run_trace(args: &Args, variant: VariantConfig, track: &beat_stage::audio::DecodedTrack) -> Result<Trace> {
    let clock = ManualClock::new();
    let session = TrackSession {
        sampler: Box::new(BufferSampler::new(
            track.first_channel(),
            track.sample_rate,
            clock.clone(),
            variant.analyser,
        )),
        clock: Box::new(clock.clone()),
        connection: Box::new(SilentConnection::default()),
        duration_seconds: track.duration_seconds,
    };

    let bands = variant.bands.iter().map(|rule| rule.band.name.clone()).collect();
    let name = variant.name.clone();
    let mut params = VisualParameterSet::from_layout(&variant.layout);
    let mut queue = FrameQueue::new();
    let mut stage = Stage::new(variant).with_seed(args.seed);
    stage.load(session, &mut queue, &mut params)?;

    let limit = args
        .seconds
        .map_or(track.duration_seconds, |s| s.min(track.duration_seconds));
    let frame_count = (limit * args.fps as f64).floor() as usize;
    let mut frames = Vec::with_capacity(frame_count);

    for index in 0..frame_count {
        clock.set(index as f64 / args.fps as f64);
        for handle in queue.take_due() {
            if let Some(report) = stage.on_frame(handle, &mut queue, &mut params) {
                stage.advance_animations(&mut params);
                let camera = params.camera();
                frames.push(TraceFrame {
                    index,
                    elapsed: report.elapsed,
                    energy: report.energy,
                    phase: stage.phase(),
                    band_hits: report.band_hits,
                    noop_hits: report.noop_hits,
                    armed: report.armed,
                    released: report.released,
                    drop_state: report.drop_state,
                    camera: camera.position,
                    look_at: camera.look_at,
                });
            }
        }
    }

    stage.reset(&mut queue, &mut params);

    Ok(Trace {
        input: args.input.clone(),
        variant: name,
        bands,
        fps: args.fps,
        seed: args.seed,
        duration_seconds: limit,
        frames,
    })
}

fn summarize(trace: &Trace) {
    info!("\n=== TRACE SUMMARY ===");
    info!("Frames: {} at {} fps", trace.frames.len(), trace.fps);

    let mut totals = vec![0usize; trace.bands.len()];
    let mut noop = 0;
    let mut energy_sum = 0.0f64;
    let mut energy_peak = 0.0f32;
    for frame in &trace.frames {
        for (total, hits) in totals.iter_mut().zip(&frame.band_hits) {
            *total += hits;
        }
        noop += frame.noop_hits;
        energy_sum += frame.energy as f64;
        energy_peak = energy_peak.max(frame.energy);
    }

    if !trace.frames.is_empty() {
        info!(
            "Energy: mean {:.1}, peak {:.1}",
            energy_sum / trace.frames.len() as f64,
            energy_peak
        );
    }
    for (band, total) in trace.bands.iter().zip(&totals) {
        info!("Band {:<10} {} bin hits", band, total);
    }
    info!("No-op        {} bin hits", noop);

    match trace.frames.iter().find(|f| f.armed) {
        Some(frame) => info!("🎯 Drop armed at {:.2}s", frame.elapsed),
        None => info!("Drop never armed"),
    }
    if let Some(frame) = trace.frames.iter().find(|f| f.released) {
        info!("💥 Drop released at {:.2}s", frame.elapsed);
    }
}
