use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{AnalyserConfig, FrequencySnapshot, ManualClock, PlaybackClock, SpectrumAnalyser};

/// Live view of the spectrum of whatever is currently playing.
///
/// Called at most once per frame. Never fails: with no signal connected the
/// snapshot is all zeros.
pub trait SpectrumSampler {
    fn sample(&mut self) -> FrequencySnapshot;

    fn bin_count(&self) -> usize;
}

/// Samples the audio the playback tap has forwarded so far.
pub struct TapSampler {
    receiver: Receiver<Vec<f32>>,
    window: VecDeque<f32>,
    analyser: SpectrumAnalyser,
}

impl TapSampler {
    pub fn new(receiver: Receiver<Vec<f32>>, config: AnalyserConfig) -> Self {
        Self {
            receiver,
            window: VecDeque::from(vec![0.0; config.fft_size]),
            analyser: SpectrumAnalyser::new(config),
        }
    }

    fn drain(&mut self) {
        let size = self.analyser.config().fft_size;
        while let Ok(chunk) = self.receiver.try_recv() {
            self.window.extend(chunk);
        }
        while self.window.len() > size {
            self.window.pop_front();
        }
    }
}

impl SpectrumSampler for TapSampler {
    fn sample(&mut self) -> FrequencySnapshot {
        self.drain();
        self.analyser.analyse(self.window.make_contiguous())
    }

    fn bin_count(&self) -> usize {
        self.analyser.config().bin_count()
    }
}

/// Samples a fully decoded buffer at the position reported by a clock.
///
/// Used for offline traces, where playback is simulated rather than heard.
pub struct BufferSampler {
    samples: Arc<[f32]>,
    sample_rate: u32,
    clock: ManualClock,
    analyser: SpectrumAnalyser,
}

impl BufferSampler {
    pub fn new(samples: Arc<[f32]>, sample_rate: u32, clock: ManualClock, config: AnalyserConfig) -> Self {
        Self {
            samples,
            sample_rate,
            clock,
            analyser: SpectrumAnalyser::new(config),
        }
    }
}

impl SpectrumSampler for BufferSampler {
    fn sample(&mut self) -> FrequencySnapshot {
        let position = (self.clock.current_time().max(0.0) * self.sample_rate as f64) as usize;
        let end = position.min(self.samples.len());
        let start = end.saturating_sub(self.analyser.config().fft_size);
        self.analyser.analyse(&self.samples[start..end])
    }

    fn bin_count(&self) -> usize {
        self.analyser.config().bin_count()
    }
}
