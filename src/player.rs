use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use crate::audio::{AudioDecoder, AudioPlayback, RodioDecoder};
use crate::effects::VariantConfig;
use crate::scene::{FrameQueue, VisualParameterSet};
use crate::stage::{Stage, StagePhase};

/// A line typed on stdin while the player runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    /// Zero-based track index.
    Select(usize),
    Quit,
}

impl Command {
    /// `n` or an empty line skips ahead, `q` quits, a 1-based number picks a track.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "" | "n" | "next" => Some(Command::Next),
            "q" | "quit" => Some(Command::Quit),
            other => match other.parse::<usize>() {
                Ok(number) if number > 0 => Some(Command::Select(number - 1)),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    pub fps: u32,
    pub volume: f32,
    pub seed: Option<u64>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            volume: 1.0,
            seed: None,
        }
    }
}

/// Real-time driver: plays tracks through the speakers and runs the stage at
/// a fixed refresh rate, standing in for the renderer's frame callbacks.
pub struct Player {
    tracks: Vec<PathBuf>,
    current: Option<usize>,
    decoder: RodioDecoder,
    playback: AudioPlayback,
    stage: Stage,
    scheduler: FrameQueue,
    params: VisualParameterSet,
    fps: u32,
    ticks: u64,
    last_phase: StagePhase,
}

impl Player {
    pub fn new(tracks: Vec<PathBuf>, variant: VariantConfig, config: PlayerConfig) -> Result<Self> {
        let mut playback = AudioPlayback::new().context("opening audio output")?;
        playback.set_volume(config.volume);

        let params = VisualParameterSet::from_layout(&variant.layout);
        let mut stage = Stage::new(variant);
        if let Some(seed) = config.seed {
            stage = stage.with_seed(seed);
        }

        Ok(Self {
            tracks,
            current: None,
            decoder: RodioDecoder,
            playback,
            stage,
            scheduler: FrameQueue::new(),
            params,
            fps: config.fps.max(1),
            ticks: 0,
            last_phase: StagePhase::Idle,
        })
    }

    /// Switch to track `index`. The running pipeline is torn down before the
    /// new file is even read; a file that fails to load leaves the stage idle.
    pub async fn select_track(&mut self, index: usize) -> Result<()> {
        let Some(path) = self.tracks.get(index).cloned() else {
            warn!("No track #{} (have {})", index + 1, self.tracks.len());
            return Ok(());
        };

        self.stage.reset(&mut self.scheduler, &mut self.params);
        self.current = Some(index);
        info!("🎵 Loading track #{}: {}", index + 1, path.display());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("❌ Could not read {}: {}", path.display(), e);
                return Ok(());
            }
        };

        let track = match self.decoder.decode(bytes).await {
            Ok(track) => track,
            Err(e) => {
                warn!("❌ {}: {}", path.display(), e);
                return Ok(());
            }
        };

        let session = self.playback.start(&track, self.stage.variant().analyser)?;
        self.stage.load(session, &mut self.scheduler, &mut self.params)?;
        Ok(())
    }

    /// Move to the next track, wrapping around when asked explicitly.
    async fn skip(&mut self) -> Result<()> {
        if self.tracks.is_empty() {
            return Ok(());
        }
        let next = self.current.map_or(0, |i| (i + 1) % self.tracks.len());
        self.select_track(next).await
    }

    /// Called when the current track has played through. Stops after the last one.
    async fn track_finished(&mut self) -> Result<()> {
        info!("Track finished");
        match self.current {
            Some(i) if i + 1 < self.tracks.len() => self.select_track(i + 1).await,
            _ => {
                self.stage.reset(&mut self.scheduler, &mut self.params);
                info!("End of playlist. Enter a track number to play again, q to quit");
                Ok(())
            }
        }
    }

    /// One display refresh: deliver due frames, then step the animations.
    pub fn tick(&mut self) {
        for handle in self.scheduler.take_due() {
            self.stage.on_frame(handle, &mut self.scheduler, &mut self.params);
        }
        self.stage.advance_animations(&mut self.params);
        self.ticks += 1;

        let phase = self.stage.phase();
        if phase != self.last_phase {
            info!("Stage {:?} -> {:?} at {:.2}s", self.last_phase, phase, self.stage.elapsed());
            self.last_phase = phase;
        }

        if self.ticks % 120 == 0 && phase != StagePhase::Idle {
            let camera = self.params.camera();
            debug!(
                "🎥 t={:.1}s camera={:?} look_at={:?}",
                self.stage.elapsed(),
                camera.position,
                camera.look_at
            );
        }
    }

    fn list_tracks(&self) {
        info!("Tracks:");
        for (i, path) in self.tracks.iter().enumerate() {
            info!("  [{}] {}", i + 1, path.display());
        }
        info!("Enter/n = next track, <number> = pick track, q = quit");
    }

    pub async fn run(mut self) -> Result<()> {
        self.list_tracks();
        self.select_track(0).await?;

        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / self.fps as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                    if self.stage.is_finished() {
                        self.track_finished().await?;
                    }
                }
                line = lines.next_line(), if stdin_open => {
                    match line? {
                        Some(line) => match Command::parse(&line) {
                            Some(Command::Next) => self.skip().await?,
                            Some(Command::Select(index)) => self.select_track(index).await?,
                            Some(Command::Quit) => break,
                            None => warn!("Unknown command '{}'", line.trim()),
                        },
                        None => {
                            debug!("stdin closed, track switching disabled");
                            stdin_open = false;
                        }
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.stage.reset(&mut self.scheduler, &mut self.params);
        info!("Player stopped after {} frames", self.ticks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse(""), Some(Command::Next));
        assert_eq!(Command::parse(" n \n"), Some(Command::Next));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("3"), Some(Command::Select(2)));
        assert_eq!(Command::parse("0"), None);
        assert_eq!(Command::parse("louder"), None);
    }

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.fps, 60);
        assert_eq!(config.volume, 1.0);
        assert!(config.seed.is_none());
    }
}
