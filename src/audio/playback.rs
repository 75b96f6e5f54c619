use anyhow::Result;
use log::info;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{AnalyserConfig, AnalysisTap, DecodedTrack, SampleClock, TapSampler};
use crate::stage::TrackSession;

/// Handle on the audio feeding a pipeline.
pub trait SourceConnection {
    /// Stop the source and detach it from the analyser. Safe to call twice.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// True once the source has played to its end.
    fn is_finished(&self) -> bool {
        false
    }
}

/// A playing rodio sink with an analysis tap in front of it.
pub struct PlaybackConnection {
    sink: Sink,
    disconnected: Arc<AtomicBool>,
}

impl SourceConnection for PlaybackConnection {
    fn disconnect(&mut self) {
        if self.disconnected.swap(true, Ordering::Relaxed) {
            return;
        }
        self.sink.stop();
        info!("Audio source disconnected");
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

pub struct AudioPlayback {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
    volume: f32,
}

impl AudioPlayback {
    pub fn new() -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;

        Ok(Self {
            stream,
            stream_handle,
            volume: 1.0,
        })
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Start playing `track` and build the analysis side that listens to it.
    pub fn start(&self, track: &DecodedTrack, config: AnalyserConfig) -> Result<TrackSession> {
        config.validate()?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let frames = Arc::new(AtomicU64::new(0));
        let disconnected = Arc::new(AtomicBool::new(false));

        let source = SamplesBuffer::new(track.channels, track.sample_rate, track.samples.to_vec());
        let tap = AnalysisTap::new(source, sender, frames.clone(), disconnected.clone());

        let sink = Sink::try_new(&self.stream_handle)?;
        sink.set_volume(self.volume);
        sink.append(tap);
        sink.play();

        info!(
            "Audio playback started ({}Hz, {} channels, {:.1}s)",
            track.sample_rate, track.channels, track.duration_seconds
        );

        Ok(TrackSession {
            sampler: Box::new(TapSampler::new(receiver, config)),
            clock: Box::new(SampleClock::new(frames, track.sample_rate)),
            connection: Box::new(PlaybackConnection { sink, disconnected }),
            duration_seconds: track.duration_seconds,
        })
    }
}
