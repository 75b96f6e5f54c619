pub mod analyser;
pub mod beat_classifier;
pub mod clock;
pub mod decoder;
pub mod energy;
pub mod playback;
pub mod sampler;
pub mod tap;

pub use analyser::SpectrumAnalyser;
pub use beat_classifier::{Band, BandMatch, BeatClassifier, BinOutcome};
pub use clock::{ManualClock, PlaybackClock, SampleClock};
pub use decoder::{AudioDecoder, DecodedTrack, RodioDecoder};
pub use energy::{normalized_level, EnergyReducer, NORMALIZATION_DIVISOR};
pub use playback::{AudioPlayback, PlaybackConnection, SourceConnection};
pub use sampler::{BufferSampler, SpectrumSampler, TapSampler};
pub use tap::AnalysisTap;

use serde::{Deserialize, Serialize};

use crate::error::{StageError, StageResult};

/// One frame of byte frequency data, one entry per analysis bin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrequencySnapshot(Vec<u8>);

impl FrequencySnapshot {
    pub fn new(bins: Vec<u8>) -> Self {
        Self(bins)
    }

    pub fn silent(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn bins(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FrequencySnapshot {
    fn from(bins: Vec<u8>) -> Self {
        Self(bins)
    }
}

/// Settings of the analysis node, fixed when a pipeline is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Transform size in samples; the snapshot holds half as many bins.
    pub fft_size: usize,
    /// Weight of the previous frame in the magnitude average (0.0-1.0).
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 64,
            smoothing: 0.4,
            min_db: -90.0,
            max_db: -10.0,
        }
    }
}

impl AnalyserConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> StageResult<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(StageError::InvalidAnalyser(format!(
                "fft_size must be a power of two between 32 and 32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(StageError::InvalidAnalyser(format!(
                "smoothing must be within 0.0-1.0, got {}",
                self.smoothing
            )));
        }
        if self.min_db >= self.max_db {
            return Err(StageError::InvalidAnalyser(format!(
                "min_db ({}) must be below max_db ({})",
                self.min_db, self.max_db
            )));
        }
        Ok(())
    }
}
