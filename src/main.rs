use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use beat_stage::effects::VariantConfig;
use beat_stage::player::{Player, PlayerConfig};

#[derive(Parser)]
#[command(name = "beat-stage")]
#[command(about = "Audio-reactive stage: plays tracks and drives visual parameters from the beat")]
struct Args {
    /// Audio files to play, in order (MP3, WAV, M4A, OGG, etc.)
    tracks: Vec<PathBuf>,

    /// Built-in visualization variant
    #[arg(short, long, default_value = "drop")]
    variant: String,

    /// Load the variant from a JSON file instead
    #[arg(long)]
    variant_file: Option<PathBuf>,

    /// Frame rate of the sampling loop
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=240))]
    fps: u32,

    /// Playback volume (0.0-1.0)
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Seed for colour and scatter randomness
    #[arg(long)]
    seed: Option<u64>,

    /// List the built-in variants and exit
    #[arg(long)]
    list_variants: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_variants {
        for variant in VariantConfig::all_builtin() {
            info!("{:<8} {}", variant.name, variant.description);
        }
        return Ok(());
    }

    if args.tracks.is_empty() {
        bail!("no tracks given (see --help)");
    }

    let variant = VariantConfig::load(&args.variant, args.variant_file.as_deref())?;
    info!("Starting beat-stage with variant '{}'", variant.name);

    let config = PlayerConfig {
        fps: args.fps,
        volume: args.volume,
        seed: args.seed,
    };
    Player::new(args.tracks, variant, config)?.run().await
}
